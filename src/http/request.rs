//! Inbound request view handed to route handlers.

use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::http::{HeaderMap, Method, Uri};
use hyper::Request;

/// An inbound request plus the peer address it arrived from.
///
/// The body is taken by value; dispatch keeps a body-less copy for the
/// 404/500 fallback handlers.
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: SocketAddr,
    body: Option<Incoming>,
}

impl HttpRequest {
    pub(crate) fn new(req: Request<Incoming>, remote_addr: SocketAddr) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            remote_addr,
            body: Some(body),
        }
    }

    /// Copy of this request without its body, for fallback handlers.
    pub(crate) fn without_body(&self) -> Self {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            remote_addr: self.remote_addr,
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path, without query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query string, as sent by the client.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Read the whole request body. Empty if the body was already taken.
    pub async fn read_body(&mut self) -> Result<Bytes, hyper::Error> {
        match self.body.take() {
            Some(body) => Ok(body.collect().await?.to_bytes()),
            None => Ok(Bytes::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(method: Method, uri: &str, remote_addr: SocketAddr) -> Self {
        Self {
            method,
            uri: uri.parse().expect("test uri"),
            headers: HeaderMap::new(),
            remote_addr,
            body: None,
        }
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}
