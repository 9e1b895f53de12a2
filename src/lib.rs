//! Embeddable HTTP/HTTPS front end with regex route dispatch, content-mode
//! rendering, graceful drain, and server-sent-event broadcast hubs.

pub mod config;
pub mod diag;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod realtime;
pub mod routing;
pub mod server;

pub use config::{load_config, EvictionPolicy, ServerConfig};
pub use diag::DiagnosticSink;
pub use error::{Result, ServerError};
pub use realtime::{sse, sse_keyed, Hub, HubRegistry, Subscriber};
pub use routing::{
    download, favicon, handler, humans, proxy, redirect, robots, static_files, url, ContentMode,
    Handler, Outcome, Route,
};
pub use server::Server;
