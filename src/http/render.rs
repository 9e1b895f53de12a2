//! Response rendering: maps a handler's string result and the route's
//! content mode into wire-level framing.
//!
//! # Design Decisions
//! - Exactly one `Content-Type` header per mode
//! - Body is written verbatim; only JSON mode re-encodes
//! - Unknown modes are a diagnostic event, not a client-visible error

use hyper::StatusCode;

use crate::diag::DiagnosticSink;
use crate::http::response::{self, HttpResponse};
use crate::routing::ContentMode;

/// Renders handler results according to the route's declared content mode.
#[derive(Clone)]
pub struct Renderer {
    diag: DiagnosticSink,
}

impl Renderer {
    pub fn new(diag: DiagnosticSink) -> Self {
        Self { diag }
    }

    /// Frame `body` for the wire.
    ///
    /// `path` and `raw_pattern` feed the AUTO mode, which derives the MIME
    /// type from the path suffix beyond the raw pattern's length.
    pub fn render(
        &self,
        mode: ContentMode,
        body: String,
        status: StatusCode,
        path: &str,
        raw_pattern: &str,
    ) -> HttpResponse {
        match mode {
            ContentMode::Html => response::with_content_type(status, "text/html", body),
            ContentMode::Plain => response::with_content_type(status, "text/plain", body),
            ContentMode::Json => {
                let wrapped = serde_json::json!({ "message": body }).to_string();
                response::with_content_type(status, "application/json", wrapped)
            }
            ContentMode::Auto => {
                let suffix = path.get(raw_pattern.len()..).unwrap_or("");
                response::with_content_type(status, mime_for_path(suffix), body)
            }
            ContentMode::Icon => response::with_content_type(status, "image/x-icon", body),
            ContentMode::Download => {
                let mut resp =
                    response::with_content_type(status, "application/octet-stream", body);
                resp.headers_mut().insert(
                    hyper::header::CONTENT_DISPOSITION,
                    hyper::header::HeaderValue::from_static("attachment"),
                );
                resp
            }
            other => {
                self.diag
                    .event(format!("unknown content mode: {other:?}"));
                let mut resp = hyper::Response::new(response::empty());
                *resp.status_mut() = status;
                resp
            }
        }
    }
}

/// MIME type for a path, derived from its file extension.
///
/// Sniffing tables are out of scope; this covers the extensions the static
/// route constructors are expected to serve. `text/plain` when the suffix is
/// absent or unrecognized.
pub(crate) fn mime_for_path(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "htm" | "html" | "shtml" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header;

    fn renderer() -> Renderer {
        Renderer::new(DiagnosticSink::default())
    }

    async fn body_string(resp: HttpResponse) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn plain_mode_sets_text_plain_and_writes_verbatim() {
        let resp = renderer().render(
            ContentMode::Plain,
            "hello".into(),
            StatusCode::OK,
            "/",
            "^/$",
        );
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(resp).await, "hello");
    }

    #[tokio::test]
    async fn json_mode_wraps_message_and_round_trips() {
        let resp = renderer().render(
            ContentMode::Json,
            "a \"quoted\" value".into(),
            StatusCode::OK,
            "/",
            "^/$",
        );
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(parsed["message"], "a \"quoted\" value");
    }

    #[tokio::test]
    async fn auto_mode_derives_mime_from_suffix_beyond_pattern() {
        let resp = renderer().render(
            ContentMode::Auto,
            "svg here".into(),
            StatusCode::OK,
            "/static/logo.svg",
            "/static/",
        );
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/svg+xml");
    }

    #[tokio::test]
    async fn auto_mode_falls_back_to_text_plain_without_suffix() {
        let resp = renderer().render(
            ContentMode::Auto,
            "data".into(),
            StatusCode::OK,
            "/static/",
            "/static/",
        );
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn download_mode_adds_attachment_disposition() {
        let resp = renderer().render(
            ContentMode::Download,
            "payload".into(),
            StatusCode::OK,
            "/dl",
            "^/dl$",
        );
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(resp.headers()[header::CONTENT_DISPOSITION], "attachment");
    }

    #[tokio::test]
    async fn icon_mode_sets_icon_type() {
        let resp = renderer().render(
            ContentMode::Icon,
            "\u{0}ico".into(),
            StatusCode::OK,
            "/favicon.ico",
            "^/favicon.ico$",
        );
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/x-icon");
    }

    #[tokio::test]
    async fn unknown_mode_is_reported_and_writes_no_headers() {
        let (diag, mut rx) = DiagnosticSink::channel();
        let resp = Renderer::new(diag).render(
            ContentMode::Unspecified,
            "body".into(),
            StatusCode::OK,
            "/",
            "^/$",
        );
        assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
        let event = rx.recv().await.unwrap();
        assert!(event.contains("unknown content mode"));
    }
}
