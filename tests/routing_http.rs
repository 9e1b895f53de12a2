//! End-to-end routing tests over real sockets.

use hyper::StatusCode;
use webfront::{handler, redirect, robots, url, ContentMode, Outcome, Server};

mod common;

fn hello_route() -> webfront::Route {
    url(
        "^/$",
        handler(|_req| async { Outcome::Rendered("hello".to_string(), StatusCode::OK) }),
        ContentMode::Plain,
    )
    .unwrap()
}

#[tokio::test]
async fn plain_route_round_trip() {
    let (server, addr) = common::start_server(vec![hello_route()]).await;
    let client = common::client();

    let res = client
        .get(common::base_url(addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.text().await.unwrap(), "hello");

    server.stop();
}

#[tokio::test]
async fn json_mode_wraps_body_in_message() {
    let route = url(
        "^/api$",
        handler(|_req| async { Outcome::Rendered("pong".to_string(), StatusCode::OK) }),
        ContentMode::Json,
    )
    .unwrap();
    let (server, addr) = common::start_server(vec![route]).await;
    let client = common::client();

    let res = client
        .get(format!("{}/api", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["content-type"], "application/json");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "pong");

    server.stop();
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let (server, addr) = common::start_server(vec![hello_route()]).await;
    let client = common::client();

    let res = client
        .get(format!("{}/missing", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "404 page not found");

    server.stop();
}

#[tokio::test]
async fn custom_404_handler_answers_unmatched_paths() {
    let mut server = Server::new(0, std::time::Duration::from_secs(10));
    server.add_route(hello_route());
    server.set_404_handler(handler(|_req| async {
        Outcome::Rendered("try the front door".to_string(), StatusCode::NOT_FOUND)
    }));
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();
    let client = common::client();

    let res = client
        .get(format!("{}/missing", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "try the front door");

    server.stop();
}

#[tokio::test]
async fn redirect_route_issues_location() {
    let route = redirect("^/go/$", "/golang/", 301).unwrap();
    let (server, addr) = common::start_server(vec![route, hello_route()]).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();
    let res = client
        .get(format!("{}/go/", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/golang/");

    server.stop();
}

#[tokio::test]
async fn robots_txt_is_served() {
    let route = robots("User-agent: *\nDisallow:").unwrap();
    let (server, addr) = common::start_server(vec![route]).await;
    let client = common::client();

    let res = client
        .get(format!("{}/robots.txt", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().starts_with("User-agent:"));

    server.stop();
}

#[tokio::test]
async fn proxy_route_relays_upstream_body() {
    let upstream = common::start_mock_upstream("from upstream").await;
    let route = webfront::proxy("^/api/", &format!("http://{upstream}/")).unwrap();
    let (server, addr) = common::start_server(vec![route]).await;
    let client = common::client();

    let res = client
        .get(format!("{}/api/things", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "from upstream");

    server.stop();
}

#[tokio::test]
async fn unreachable_proxy_upstream_is_bad_gateway() {
    // Nothing listens on this port; the route answers through the 500 path.
    let route = webfront::proxy("^/api/", "http://127.0.0.1:1/").unwrap();
    let (server, addr) = common::start_server(vec![route]).await;

    let res = common::client()
        .get(format!("{}/api/things", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    server.stop();
}

#[tokio::test]
async fn handler_status_418_is_rendered() {
    let route = url(
        "^/tea$",
        handler(|_req| async {
            Outcome::Rendered("short and stout".to_string(), StatusCode::IM_A_TEAPOT)
        }),
        ContentMode::Plain,
    )
    .unwrap();
    let (server, addr) = common::start_server(vec![route]).await;
    let client = common::client();

    let res = client
        .get(format!("{}/tea", common::base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 418);

    server.stop();
}
