//! Server-sent event routes backed by broadcast hubs.

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{header, Method, Response, StatusCode};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::Result;
use crate::http::response::HttpResponse;
use crate::realtime::hub::{Hub, Subscriber};
use crate::realtime::registry::HubRegistry;
use crate::routing::{handler, ContentMode, Outcome, Route};

/// Interval after which a stream with no traffic emits a keep-alive event.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(45);

/// Keep-alive cycles before a stream is terminated (~18 hours).
pub const MAX_KEEPALIVE_CYCLES: u32 = 1440;

/// Streaming route delivering `hub` broadcasts to each connected client.
///
/// Each connection registers a subscriber, relays messages as they arrive,
/// emits a keep-alive payload when none arrives within
/// [`KEEPALIVE_INTERVAL`], and ends after [`MAX_KEEPALIVE_CYCLES`] quiet
/// intervals. Disconnects drop the stream, which unregisters the subscriber.
pub fn sse(pattern: &str, hub: Hub) -> Result<Route> {
    Route::new(
        pattern,
        handler(move |req| {
            let hub = hub.clone();
            async move {
                let subscriber = hub.register(req.remote_addr().to_string());
                Outcome::Written(stream_response(subscriber))
            }
        }),
        ContentMode::Manual,
    )
}

/// Streaming route addressing one hub per URL.
///
/// GET subscribes, creating the hub on first use. POST with a known key
/// broadcasts the request body and answers 202; POST with an unknown key or
/// any other method is method-not-allowed.
pub fn sse_keyed(pattern: &str, registry: HubRegistry) -> Result<Route> {
    Route::new(
        pattern,
        handler(move |mut req| {
            let registry = registry.clone();
            async move {
                let key = req.path_and_query().to_string();
                match *req.method() {
                    Method::GET => {
                        let hub = registry.get_or_create(&key).await;
                        let subscriber = hub.register(req.remote_addr().to_string());
                        Outcome::Written(stream_response(subscriber))
                    }
                    Method::POST => match registry.lookup(&key).await {
                        Some(hub) => match req.read_body().await {
                            Ok(body) => {
                                hub.broadcast(String::from_utf8_lossy(&body).into_owned());
                                Outcome::Written(accepted_response())
                            }
                            Err(_) => {
                                Outcome::Rendered(String::new(), StatusCode::BAD_REQUEST)
                            }
                        },
                        None => {
                            Outcome::Rendered(String::new(), StatusCode::METHOD_NOT_ALLOWED)
                        }
                    },
                    _ => Outcome::Rendered(String::new(), StatusCode::METHOD_NOT_ALLOWED),
                }
            }
        }),
        ContentMode::Manual,
    )
}

fn accepted_response() -> HttpResponse {
    crate::http::response::with_content_type(StatusCode::ACCEPTED, "text/plain", "accepted")
}

/// Build the event-stream response around a registered subscriber.
///
/// The subscriber lives inside the stream state, so every termination path
/// (cycle limit, hub teardown, client disconnect) unregisters it via drop.
fn stream_response(subscriber: Subscriber) -> HttpResponse {
    let events = stream::unfold((subscriber, 0u32), |(mut subscriber, quiet)| async move {
        if quiet >= MAX_KEEPALIVE_CYCLES {
            return None;
        }
        tokio::select! {
            message = subscriber.recv() => message
                .map(|m| (Ok::<_, Infallible>(Frame::data(event_frame(&m))), (subscriber, quiet))),
            _ = tokio::time::sleep(KEEPALIVE_INTERVAL) => Some((
                Ok(Frame::data(keepalive_frame())),
                (subscriber, quiet + 1),
            )),
        }
    });

    let mut resp = Response::new(StreamBody::new(events).boxed_unsync());
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/event-stream"),
    );
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    resp
}

fn event_frame(message: &str) -> Bytes {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let payload = serde_json::json!({ "str": message, "time": now });
    Bytes::from(format!("data: {payload}\n\n"))
}

fn keepalive_frame() -> Bytes {
    Bytes::from_static(b"data: {\"str\": \"No Data\"}\n\n")
}
