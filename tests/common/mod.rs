//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use webfront::{Route, Server};

/// Start a server on an ephemeral port with the given routes.
///
/// Returns the server handle and the plaintext listener's address.
pub async fn start_server(routes: Vec<Route>) -> (Arc<Server>, SocketAddr) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut server = Server::new(0, Duration::from_secs(10));
    server.add_routes(routes);
    let server = Arc::new(server);
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// A client that never reuses pooled connections between tests.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://127.0.0.1:{}", addr.port())
}

/// Start a raw mock upstream returning a fixed body, for proxy tests.
#[allow(dead_code)]
pub async fn start_mock_upstream(response: &'static str) -> SocketAddr {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}
