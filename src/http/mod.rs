//! HTTP request handling: dispatch and response rendering.

pub mod dispatch;
pub mod render;
pub mod request;
pub mod response;

pub use dispatch::Dispatcher;
pub use render::Renderer;
pub use request::HttpRequest;
pub use response::{Body, HttpResponse};
