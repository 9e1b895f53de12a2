//! The route rule: pattern + handler + content mode.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use hyper::StatusCode;
use regex::Regex;

use crate::error::{Result, ServerError};
use crate::http::request::HttpRequest;
use crate::http::response::{self, HttpResponse};

/// How a handler's string result is framed as an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Derive the MIME type from the trailing path segment.
    Auto,
    Html,
    Json,
    Plain,
    Icon,
    Download,
    Redirect,
    Proxy,
    /// The handler builds the complete response itself; the renderer must
    /// not touch headers or body.
    Manual,
    Unspecified,
}

/// What a handler produced.
pub enum Outcome {
    /// Body to be framed by the renderer according to the route's mode,
    /// dispatched on the status code.
    Rendered(String, StatusCode),
    /// Redirect to the target with the given 3xx status.
    Redirect(String, StatusCode),
    /// The handler already wrote the full response (the MANUAL contract).
    Written(HttpResponse),
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// An async route handler.
pub type Handler = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Box a closure returning a future into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// An immutable association of a URL pattern, a handler, and a content mode.
#[derive(Clone)]
pub struct Route {
    pattern: Regex,
    raw_pattern: String,
    handler: Handler,
    mode: ContentMode,
}

impl Route {
    pub fn new(pattern: &str, handler: Handler, mode: ContentMode) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|source| ServerError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            raw_pattern: pattern.to_string(),
            handler,
            mode,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn raw_pattern(&self) -> &str {
        &self.raw_pattern
    }

    pub fn mode(&self) -> ContentMode {
        self.mode
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.raw_pattern)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Route for a URL pattern with an explicit content mode.
pub fn url(pattern: &str, h: Handler, mode: ContentMode) -> Result<Route> {
    Route::new(pattern, h, mode)
}

/// Route whose response is sent with the attachment header.
pub fn download(pattern: &str, h: Handler) -> Result<Route> {
    Route::new(pattern, h, ContentMode::Download)
}

/// Route issuing an HTTP redirect to `destination`.
pub fn redirect(pattern: &str, destination: &str, status: u16) -> Result<Route> {
    let status = StatusCode::from_u16(status).map_err(|_| ServerError::RedirectStatus(status))?;
    if !status.is_redirection() {
        return Err(ServerError::RedirectStatus(status.as_u16()));
    }
    let destination = destination.to_string();
    Route::new(
        pattern,
        handler(move |_req| {
            let destination = destination.clone();
            async move { Outcome::Redirect(destination, status) }
        }),
        ContentMode::Redirect,
    )
}

/// Route serving a fixed `robots.txt` body.
pub fn robots(data: &str) -> Result<Route> {
    fixed_plain("^/robots.txt$", data)
}

/// Route serving a fixed `humans.txt` body.
pub fn humans(data: &str) -> Result<Route> {
    fixed_plain("^/humans.txt$", data)
}

fn fixed_plain(pattern: &str, data: &str) -> Result<Route> {
    let data = data.to_string();
    Route::new(
        pattern,
        handler(move |_req| {
            let data = data.clone();
            async move { Outcome::Rendered(data, StatusCode::OK) }
        }),
        ContentMode::Plain,
    )
}

/// Route serving a favicon read eagerly from `path`.
///
/// A failed read is deferred: the route answers 404 instead of failing
/// construction, matching the other constructors' degrade-don't-abort shape.
pub fn favicon(path: impl AsRef<Path>) -> Result<Route> {
    let data = std::fs::read(path.as_ref()).ok().map(bytes::Bytes::from);
    Route::new(
        "^/favicon.ico$",
        handler(move |_req| {
            let data = data.clone();
            async move {
                match data {
                    Some(bytes) => Outcome::Written(response::with_content_type(
                        StatusCode::OK,
                        "image/x-icon",
                        bytes,
                    )),
                    None => Outcome::Rendered(String::new(), StatusCode::NOT_FOUND),
                }
            }
        }),
        ContentMode::Icon,
    )
}
