//! Reverse-proxy route constructor.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use regex::Regex;

use crate::error::{Result, ServerError};
use crate::http::response;
use crate::routing::route::{handler, ContentMode, Outcome, Route};

/// Route forwarding matched requests to `destination`.
///
/// The matched pattern is stripped from the request's path-and-query and the
/// remainder appended to `destination`. Method, headers, and body are
/// forwarded; the upstream response is relayed back verbatim. Upstream
/// failures surface through the 500 path as 502.
pub fn proxy(pattern: &str, destination: &str) -> Result<Route> {
    let strip = Regex::new(pattern).map_err(|source| ServerError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let destination = destination.trim_end_matches('/').to_string();
    let client: Client<HttpConnector, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build(HttpConnector::new());

    Route::new(
        pattern,
        handler(move |mut req| {
            let strip = strip.clone();
            let destination = destination.clone();
            let client = client.clone();
            async move {
                let remainder = strip.replace(req.path_and_query(), "");
                let target = format!("{destination}/{}", remainder.trim_start_matches('/'));
                let uri: hyper::Uri = match target.parse() {
                    Ok(uri) => uri,
                    Err(_) => return Outcome::Rendered(String::new(), StatusCode::BAD_GATEWAY),
                };

                let body = match req.read_body().await {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        return Outcome::Rendered(
                            String::new(),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        )
                    }
                };

                let mut upstream = Request::builder().method(req.method().clone()).uri(uri);
                if let Some(headers) = upstream.headers_mut() {
                    for (name, value) in req.headers() {
                        if name != hyper::header::HOST {
                            headers.insert(name.clone(), value.clone());
                        }
                    }
                }
                let upstream = match upstream.body(Full::new(body)) {
                    Ok(r) => r,
                    Err(_) => return Outcome::Rendered(String::new(), StatusCode::BAD_GATEWAY),
                };

                match client.request(upstream).await {
                    Ok(resp) => {
                        let (parts, body) = resp.into_parts();
                        let bytes = match body.collect().await {
                            Ok(collected) => collected.to_bytes(),
                            Err(_) => {
                                return Outcome::Rendered(String::new(), StatusCode::BAD_GATEWAY)
                            }
                        };
                        let mut relayed = hyper::Response::new(response::full(bytes));
                        *relayed.status_mut() = parts.status;
                        *relayed.headers_mut() = parts.headers;
                        Outcome::Written(relayed)
                    }
                    Err(_) => Outcome::Rendered(String::new(), StatusCode::BAD_GATEWAY),
                }
            }
        }),
        ContentMode::Proxy,
    )
}
