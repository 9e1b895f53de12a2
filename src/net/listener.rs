//! Accept loops for the plaintext and encrypted listeners.
//!
//! # Responsibilities
//! - Accept connections while the running flag holds
//! - Survive transient accept errors: report and retry
//! - Serve each connection on its own task
//! - Release the loop's completion-counter unit on exit

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use crate::diag::DiagnosticSink;
use crate::http::dispatch::Dispatcher;
use crate::http::request::HttpRequest;
use crate::http::response::{GuardedBody, HttpResponse};
use crate::lifecycle::{WaitGroup, WaitGuard};

/// Shared state every accept loop and connection task needs.
#[derive(Clone)]
pub(crate) struct ConnContext {
    pub dispatcher: Arc<Dispatcher>,
    pub running: Arc<AtomicBool>,
    pub shutdown: Arc<Notify>,
    pub wg: WaitGroup,
    pub read_timeout: Duration,
    pub diag: DiagnosticSink,
}

/// Accept loop for the plaintext listener. Holds `guard` until exit.
pub(crate) async fn run_plain(listener: TcpListener, ctx: ConnContext, guard: WaitGuard) {
    let _guard = guard;
    // Register interest in the shutdown signal before the first accept.
    // `notify_waiters` only wakes already-registered waiters, so a fresh
    // `notified()` created inside the select could miss a stop that fired
    // before this task's first poll and park in `accept` forever.
    let mut shutdown = std::pin::pin!(ctx.shutdown.notified());
    shutdown.as_mut().enable();
    while ctx.running.load(Ordering::SeqCst) {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if !ctx.running.load(Ordering::SeqCst) {
                        break;
                    }
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, peer, ctx).await;
                    });
                }
                Err(e) => {
                    ctx.diag.event(format!("accept error: {e}"));
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            _ = shutdown.as_mut() => break,
        }
    }
}

/// Accept loop for the encrypted listener. The TLS handshake runs on the
/// connection's task so a stalled handshake cannot block accepting.
pub(crate) async fn run_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    ctx: ConnContext,
    guard: WaitGuard,
) {
    let _guard = guard;
    // Same registration order as the plaintext loop: a stop fired before
    // this task's first poll must still be observed.
    let mut shutdown = std::pin::pin!(ctx.shutdown.notified());
    shutdown.as_mut().enable();
    while ctx.running.load(Ordering::SeqCst) {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if !ctx.running.load(Ordering::SeqCst) {
                        break;
                    }
                    let ctx = ctx.clone();
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => serve_connection(tls_stream, peer, ctx).await,
                            Err(e) => ctx.diag.event(format!("TLS handshake failed: {e}")),
                        }
                    });
                }
                Err(e) => {
                    ctx.diag.event(format!("accept error: {e}"));
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            _ = shutdown.as_mut() => break,
        }
    }
}

/// Serve one connection: every request runs through the dispatcher and
/// holds an in-flight unit until its response body is done.
async fn serve_connection<I>(io: I, peer: SocketAddr, ctx: ConnContext)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let dispatcher = ctx.dispatcher.clone();
    let wg = ctx.wg.clone();
    let service = service_fn(move |req| {
        let dispatcher = dispatcher.clone();
        let guard = wg.guard();
        async move {
            let resp = dispatcher.dispatch(HttpRequest::new(req, peer)).await;
            Ok::<HttpResponse, Infallible>(GuardedBody::wrap(resp, guard))
        }
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(ctx.read_timeout);

    if let Err(e) = builder
        .serve_connection_with_upgrades(TokioIo::new(io), service)
        .await
    {
        ctx.diag.event(format!("connection error from {peer}: {e}"));
    }
}
