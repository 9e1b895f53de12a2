//! Response body plumbing.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Frame;
use hyper::header;
use hyper::{Response, StatusCode};

use crate::lifecycle::WaitGuard;

/// Boxed response body used throughout the crate.
pub type Body = UnsyncBoxBody<Bytes, Infallible>;

/// Response type produced by dispatch.
pub type HttpResponse = Response<Body>;

/// A body holding the given bytes.
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into()).boxed_unsync()
}

/// An empty body.
pub fn empty() -> Body {
    Empty::<Bytes>::new().boxed_unsync()
}

/// Build a response with one `Content-Type` header and a verbatim body.
pub fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> HttpResponse {
    let mut resp = Response::new(full(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    resp
}

/// Build a redirect to `location` with the given status code.
pub fn redirect(location: &str, status: StatusCode) -> HttpResponse {
    let mut resp = Response::new(empty());
    *resp.status_mut() = status;
    if let Ok(value) = header::HeaderValue::from_str(location) {
        resp.headers_mut().insert(header::LOCATION, value);
    }
    resp
}

/// Wraps a body so a wait-group unit is held until the body is dropped.
///
/// Streaming responses outlive the dispatch call that produced them; tying
/// the in-flight unit to the body keeps `await_stop` honest for those.
pub(crate) struct GuardedBody {
    inner: Body,
    _guard: WaitGuard,
}

impl GuardedBody {
    pub(crate) fn wrap(resp: HttpResponse, guard: WaitGuard) -> HttpResponse {
        resp.map(|inner| {
            GuardedBody {
                inner,
                _guard: guard,
            }
            .boxed_unsync()
        })
    }
}

impl hyper::body::Body for GuardedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> hyper::body::SizeHint {
        self.inner.size_hint()
    }
}
