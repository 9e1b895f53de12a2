//! The embeddable server: configuration surface and listener lifecycle.
//!
//! # Lifecycle
//! ```text
//! CREATED --start()--> STARTED --stop()--> STOPPING --drain--> STOPPED
//! ```
//! `start` launches one accept loop per listener; `stop` is idempotent and
//! releases the lifecycle's own completion-counter unit; `await_stop`
//! returns once every accept loop has exited and every in-flight request
//! has finished.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use crate::config::{CertSource, ServerConfig, TlsSettings};
use crate::diag::DiagnosticSink;
use crate::http::dispatch::Dispatcher;
use crate::net::listener::{self, ConnContext};
use crate::net::tls;
use crate::error::{Result, ServerError};
use crate::lifecycle::WaitGroup;
use crate::realtime::HubRegistry;
use crate::routing::{Handler, Route, RouteTable};

/// An embeddable HTTP/HTTPS front end.
///
/// Routes and handlers are registered before [`Server::start`]; the route
/// table is read-only once dispatching begins.
pub struct Server {
    config: ServerConfig,
    routes: RouteTable,
    handler_404: Option<Handler>,
    handler_500: Option<Handler>,
    diag: DiagnosticSink,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    shutdown: Arc<Notify>,
    wg: WaitGroup,
    plain_addr: Mutex<Option<SocketAddr>>,
    secure_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    /// Server listening on `port` with the given header read timeout (see
    /// [`ServerConfig::read_timeout_secs`]).
    pub fn new(port: u16, read_timeout: Duration) -> Self {
        let mut config = ServerConfig::default();
        config.bind_address = format!("0.0.0.0:{port}");
        config.read_timeout_secs = read_timeout.as_secs();
        Self::from_config(config)
    }

    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            handler_404: None,
            handler_500: None,
            diag: DiagnosticSink::default(),
            running: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            wg: WaitGroup::new(),
            plain_addr: Mutex::new(None),
            secure_addr: Mutex::new(None),
        }
    }

    /// Route diagnostics into `sink` instead of the default logger.
    pub fn set_diagnostic_sink(&mut self, sink: DiagnosticSink) {
        self.diag = sink;
    }

    /// Enable the TLS listener on `port` with an initial certificate pair.
    pub fn configure_tls(
        &mut self,
        port: u16,
        key_path: impl Into<PathBuf>,
        cert_path: impl Into<PathBuf>,
        http2: bool,
    ) {
        let tls = self.config.tls.get_or_insert_with(|| TlsSettings {
            bind_address: String::new(),
            http2: false,
            certificates: Vec::new(),
        });
        tls.bind_address = format!("0.0.0.0:{port}");
        tls.http2 = http2;
        tls.certificates.push(CertSource {
            host: None,
            key_path: key_path.into(),
            cert_path: cert_path.into(),
        });
    }

    /// Add a fallback certificate pair, tried in registration order.
    pub fn add_tls_certificate(
        &mut self,
        key_path: impl Into<PathBuf>,
        cert_path: impl Into<PathBuf>,
    ) {
        if let Some(tls) = &mut self.config.tls {
            tls.certificates.push(CertSource {
                host: None,
                key_path: key_path.into(),
                cert_path: cert_path.into(),
            });
        }
    }

    /// Add a certificate served when the TLS client hello names `host`.
    pub fn add_tls_certificate_for_host(
        &mut self,
        host: impl Into<String>,
        key_path: impl Into<PathBuf>,
        cert_path: impl Into<PathBuf>,
    ) {
        if let Some(tls) = &mut self.config.tls {
            tls.certificates.push(CertSource {
                host: Some(host.into()),
                key_path: key_path.into(),
                cert_path: cert_path.into(),
            });
        }
    }

    /// A keyed hub registry using the configured eviction policy and this
    /// server's diagnostic sink. Each call creates an independent registry;
    /// pass it to the keyed streaming route constructor and keep a clone for
    /// publishing.
    pub fn hub_registry(&self) -> HubRegistry {
        let registry =
            HubRegistry::with_diagnostics(self.config.hub_eviction, self.diag.clone());
        let _ = registry.spawn_eviction_task();
        registry
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn add_routes(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    pub fn set_404_handler(&mut self, handler: Handler) {
        self.handler_404 = Some(handler);
    }

    pub fn set_500_handler(&mut self, handler: Handler) {
        self.handler_500 = Some(handler);
    }

    /// Bind the listeners and launch their accept loops.
    ///
    /// Failing to bind the plaintext listener is fatal. Certificate load
    /// failures are not: the TLS listener degrades to the next certificate
    /// or a synthesized self-signed pair.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }
        self.running.store(true, Ordering::SeqCst);
        // The lifecycle's own completion unit, released by `stop`.
        self.wg.add(1);

        let dispatcher = Arc::new(Dispatcher::new(
            self.routes.clone(),
            self.handler_404.clone(),
            self.handler_500.clone(),
            self.diag.clone(),
        ));

        let ctx = ConnContext {
            dispatcher,
            running: self.running.clone(),
            shutdown: self.shutdown.clone(),
            wg: self.wg.clone(),
            read_timeout: self.config.read_timeout(),
            diag: self.diag.clone(),
        };

        let plain = TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(|source| {
                self.diag.event(format!(
                    "can't bind {}: {source}",
                    self.config.bind_address
                ));
                ServerError::Bind {
                    addr: self.config.bind_address.clone(),
                    source,
                }
            })?;
        let plain_addr = plain.local_addr()?;
        *lock(&self.plain_addr) = Some(plain_addr);
        self.diag
            .event(format!("serving HTTP on {plain_addr}"));

        {
            let ctx = ctx.clone();
            let guard = self.wg.guard();
            tokio::spawn(async move {
                listener::run_plain(plain, ctx, guard).await;
            });
        }

        if let Some(tls_settings) = &self.config.tls {
            let server_config = tls::build_server_config(tls_settings, &self.diag)?;
            let acceptor = TlsAcceptor::from(server_config);

            let secure = TcpListener::bind(&tls_settings.bind_address)
                .await
                .map_err(|source| ServerError::Bind {
                    addr: tls_settings.bind_address.clone(),
                    source,
                })?;
            let secure_addr = secure.local_addr()?;
            *lock(&self.secure_addr) = Some(secure_addr);
            self.diag
                .event(format!("serving HTTPS on {secure_addr}"));

            let ctx = ctx.clone();
            let guard = self.wg.guard();
            tokio::spawn(async move {
                listener::run_tls(secure, acceptor, ctx, guard).await;
            });
        }

        Ok(())
    }

    /// Stop accepting and release the lifecycle's completion unit.
    ///
    /// Idempotent: calls after the first are no-ops. Safe to call from
    /// inside a request handler.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.diag.event("server stopping");
            self.shutdown.notify_waiters();
            self.wg.done();
        }
    }

    /// Block until every accept loop has exited and every in-flight
    /// request (including streaming responses) has finished.
    pub async fn await_stop(&self) {
        self.wg.wait().await;
    }

    /// Address the plaintext listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.plain_addr)
    }

    /// Address the TLS listener is bound to, once started.
    pub fn secure_addr(&self) -> Option<SocketAddr> {
        *lock(&self.secure_addr)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Addresses are plain data; a poisoned lock only means a writer
    // panicked mid-store, which cannot leave a torn SocketAddr.
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
