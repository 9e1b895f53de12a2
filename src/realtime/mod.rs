//! Realtime push: broadcast hubs and server-sent event routes.

pub mod hub;
pub mod registry;
pub mod sse;

pub use hub::{ClientDetails, Hub, Subscriber};
pub use registry::HubRegistry;
pub use sse::{sse, sse_keyed};
