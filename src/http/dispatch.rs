//! Request dispatch: route scan, handler invocation, outcome handling.
//!
//! # Responsibilities
//! - Scan the route table top to bottom; first match wins
//! - Invoke the matched handler inside the request's own task
//! - Act on the handler outcome per the status table
//! - Fall back to the 404/500 handlers
//!
//! # Design Decisions
//! - Handler panics are caught; the request answers through the 500 path
//!   while other requests are unaffected
//! - A rendered status outside the dispatch table is recorded and the scan
//!   resumes with the next rule, ending in the 404 path

use std::sync::Arc;

use futures_util::FutureExt;
use hyper::StatusCode;

use crate::diag::DiagnosticSink;
use crate::http::render::Renderer;
use crate::http::request::HttpRequest;
use crate::http::response::{self, HttpResponse};
use crate::routing::{Handler, Outcome, RouteTable};

/// Immutable per-server dispatch state shared by every connection task.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    handler_404: Option<Handler>,
    handler_500: Option<Handler>,
    renderer: Renderer,
    diag: DiagnosticSink,
}

impl Dispatcher {
    pub fn new(
        routes: RouteTable,
        handler_404: Option<Handler>,
        handler_500: Option<Handler>,
        diag: DiagnosticSink,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            handler_404,
            handler_500,
            renderer: Renderer::new(diag.clone()),
            diag,
        }
    }

    /// Dispatch one request to the first matching rule.
    pub async fn dispatch(&self, mut req: HttpRequest) -> HttpResponse {
        let path = req.path().to_string();

        for route in self.routes.iter() {
            if !route.matches(&path) {
                continue;
            }

            // Keep a body-less copy for the fallback handlers; the route
            // handler consumes the request.
            let fallback = req.without_body();
            let fut = (route.handler())(req);
            let outcome = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.diag
                        .event(format!("handler panicked on path: {path}"));
                    return self
                        .internal_error(&fallback, StatusCode::INTERNAL_SERVER_ERROR)
                        .await;
                }
            };

            match outcome {
                Outcome::Written(resp) => return resp,
                Outcome::Redirect(location, status) => {
                    return response::redirect(&location, status)
                }
                Outcome::Rendered(body, status) => match status.as_u16() {
                    200 | 201 | 202 | 418 => {
                        return self.renderer.render(
                            route.mode(),
                            body,
                            status,
                            &path,
                            route.raw_pattern(),
                        )
                    }
                    301 | 302 | 303 | 307 => return response::redirect(&body, status),
                    400 | 401 | 403 | 404 | 405 => {
                        return self.not_found(&fallback, status).await
                    }
                    500 | 501 | 502 | 503 => return self.internal_error(&fallback, status).await,
                    other => {
                        self.diag.event(format!(
                            "unhandled status {other} from route {}",
                            route.raw_pattern()
                        ));
                        req = fallback;
                        continue;
                    }
                },
            }
        }

        self.not_found(&req, StatusCode::NOT_FOUND).await
    }

    /// 404 path: custom handler if registered, else a generic response.
    /// `status` preserves the triggering code (400/401/403/404/405).
    async fn not_found(&self, req: &HttpRequest, status: StatusCode) -> HttpResponse {
        self.diag.event(format!("404 on path: {}", req.path()));
        match &self.handler_404 {
            Some(custom) => self.fallback_response(custom, req, status).await,
            None => response::with_content_type(status, "text/plain", "404 page not found"),
        }
    }

    /// 500 path: custom handler if registered, else a generic response.
    async fn internal_error(&self, req: &HttpRequest, status: StatusCode) -> HttpResponse {
        self.diag.event(format!("500 on path: {}", req.path()));
        match &self.handler_500 {
            Some(custom) => self.fallback_response(custom, req, status).await,
            None => response::with_content_type(status, "text/plain", "Internal Server Error"),
        }
    }

    /// Run a custom fallback handler. Its body is written with the
    /// triggering status; a panicking fallback degrades to a bare response.
    async fn fallback_response(
        &self,
        custom: &Handler,
        req: &HttpRequest,
        status: StatusCode,
    ) -> HttpResponse {
        let fut = custom(req.without_body());
        match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Outcome::Rendered(body, _)) => {
                response::with_content_type(status, "text/plain", body)
            }
            Ok(Outcome::Redirect(location, redirect_status)) => {
                response::redirect(&location, redirect_status)
            }
            Ok(Outcome::Written(resp)) => resp,
            Err(_) => {
                self.diag.event("fallback handler panicked".to_string());
                let mut resp = hyper::Response::new(response::empty());
                *resp.status_mut() = status;
                resp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::Method;
    use std::net::SocketAddr;

    use crate::routing::{handler, url, ContentMode, Route};

    fn req(path: &str) -> HttpRequest {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        HttpRequest::for_tests(Method::GET, path, addr)
    }

    fn plain_route(pattern: &str, body: &'static str, status: u16) -> Route {
        url(
            pattern,
            handler(move |_req| async move {
                Outcome::Rendered(body.to_string(), StatusCode::from_u16(status).unwrap())
            }),
            ContentMode::Plain,
        )
        .unwrap()
    }

    fn dispatcher(routes: Vec<Route>) -> Dispatcher {
        let mut table = RouteTable::new();
        table.extend(routes);
        Dispatcher::new(table, None, None, DiagnosticSink::default())
    }

    async fn body_string(resp: HttpResponse) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let d = dispatcher(vec![
            plain_route("^/tea$", "first", 200),
            plain_route("^/tea$", "second", 200),
        ]);
        let resp = d.dispatch(req("/tea")).await;
        assert_eq!(body_string(resp).await, "first");
    }

    #[tokio::test]
    async fn root_route_renders_plain_hello() {
        let d = dispatcher(vec![plain_route("^/$", "hello", 200)]);
        let resp = d.dispatch(req("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[hyper::header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(resp).await, "hello");
    }

    #[tokio::test]
    async fn no_match_yields_generic_not_found() {
        let d = dispatcher(vec![plain_route("^/$", "hello", 200)]);
        let resp = d.dispatch(req("/missing")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "404 page not found");
    }

    #[tokio::test]
    async fn custom_404_body_is_used_with_triggering_status() {
        let mut table = RouteTable::new();
        table.push(plain_route("^/gone$", "", 403));
        let d = Dispatcher::new(
            table,
            Some(handler(|_req| async {
                Outcome::Rendered("nothing here".to_string(), StatusCode::NOT_FOUND)
            })),
            None,
            DiagnosticSink::default(),
        );
        let resp = d.dispatch(req("/gone")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(resp).await, "nothing here");
    }

    #[tokio::test]
    async fn server_error_statuses_take_500_path() {
        let d = dispatcher(vec![plain_route("^/fail$", "", 503)]);
        let resp = d.dispatch(req("/fail")).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_string(resp).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn redirect_statuses_use_body_as_target() {
        let d = dispatcher(vec![plain_route("^/go/$", "/golang/", 301)]);
        let resp = d.dispatch(req("/go/")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[hyper::header::LOCATION], "/golang/");
    }

    #[tokio::test]
    async fn unlisted_status_resumes_the_scan() {
        let (diag, mut rx) = DiagnosticSink::channel();
        let mut table = RouteTable::new();
        table.push(plain_route("^/odd$", "partial", 206));
        table.push(plain_route("^/odd$", "fallback", 200));
        let d = Dispatcher::new(table, None, None, diag);

        let resp = d.dispatch(req("/odd")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "fallback");
        assert!(rx.recv().await.unwrap().contains("unhandled status 206"));
    }

    #[tokio::test]
    async fn teapot_is_rendered() {
        let d = dispatcher(vec![plain_route("^/tea$", "short and stout", 418)]);
        let resp = d.dispatch(req("/tea")).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn panicking_handler_answers_through_500_path() {
        let route = url(
            "^/panic$",
            handler(|_req| async { panic!("boom") }),
            ContentMode::Plain,
        )
        .unwrap();
        let d = dispatcher(vec![route]);
        let resp = d.dispatch(req("/panic")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
