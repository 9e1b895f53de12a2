//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Load PEM key/certificate pairs from disk
//! - Degrade per-certificate failures to diagnostics
//! - Synthesize a self-signed certificate when nothing loads
//! - Select certificates by exact SNI host, falling back to the default

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Once};

use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::{ClientHello, ResolvesServerCert};
use tokio_rustls::rustls::sign::CertifiedKey;
use tokio_rustls::rustls::ServerConfig;

use crate::config::TlsSettings;
use crate::diag::DiagnosticSink;
use crate::error::{Result, ServerError};

/// Install the process-wide crypto provider once.
///
/// Rustls requires an explicit provider when more than one is compiled in;
/// installing here keeps embedders from having to know about it.
fn ensure_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Ignore the error: another component may have installed a provider
        // first, which is fine.
        let _ = aws_lc_rs::default_provider().install_default();
    });
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|source| ServerError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(ServerError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|source| ServerError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let items = rustls_pemfile::read_all(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("failed to parse private key: {e}")))?;
    for item in items {
        match item {
            rustls_pemfile::Item::Pkcs8Key(key) => return Ok(PrivateKeyDer::Pkcs8(key)),
            rustls_pemfile::Item::Pkcs1Key(key) => return Ok(PrivateKeyDer::Pkcs1(key)),
            rustls_pemfile::Item::Sec1Key(key) => return Ok(PrivateKeyDer::Sec1(key)),
            _ => continue,
        }
    }
    Err(ServerError::Tls(format!(
        "no usable private key in {}",
        path.display()
    )))
}

/// Load one key/certificate pair into a signing-ready form.
pub(crate) fn load_certified_key(key_path: &Path, cert_path: &Path) -> Result<CertifiedKey> {
    ensure_crypto_provider();
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    let signing_key = aws_lc_rs::sign::any_supported_type(&key)
        .map_err(|e| ServerError::Tls(format!("unsupported key type: {e}")))?;
    Ok(CertifiedKey::new(certs, signing_key))
}

/// Synthesize a self-signed certificate for the given host names.
pub(crate) fn self_signed_key(hosts: &[String]) -> Result<CertifiedKey> {
    ensure_crypto_provider();
    let generated = rcgen::generate_simple_self_signed(hosts.to_vec())
        .map_err(|e| ServerError::Tls(format!("failed to generate certificate: {e}")))?;
    let cert_der = CertificateDer::from(generated.cert.der().to_vec());
    let key_der = PrivateKeyDer::try_from(generated.key_pair.serialize_der())
        .map_err(|e| ServerError::Tls(format!("generated key not usable: {e}")))?;
    let signing_key = aws_lc_rs::sign::any_supported_type(&key_der)
        .map_err(|e| ServerError::Tls(format!("unsupported key type: {e}")))?;
    Ok(CertifiedKey::new(vec![cert_der], signing_key))
}

/// Serves the certificate registered for the client's SNI host, or the
/// default certificate when no host matches.
#[derive(Debug)]
struct SniResolver {
    default: Arc<CertifiedKey>,
    by_host: HashMap<String, Arc<CertifiedKey>>,
}

impl ResolvesServerCert for SniResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        client_hello
            .server_name()
            .and_then(|name| self.by_host.get(name).cloned())
            .or_else(|| Some(self.default.clone()))
    }
}

/// Build the rustls server configuration for a TLS listener.
///
/// Certificates are tried in declaration order. Load failures are reported
/// to the diagnostic sink and skipped; when nothing loads, a self-signed
/// certificate is synthesized so startup still succeeds.
pub(crate) fn build_server_config(
    settings: &TlsSettings,
    diag: &DiagnosticSink,
) -> Result<Arc<ServerConfig>> {
    ensure_crypto_provider();

    let mut default: Option<Arc<CertifiedKey>> = None;
    let mut by_host: HashMap<String, Arc<CertifiedKey>> = HashMap::new();

    for source in &settings.certificates {
        match load_certified_key(&source.key_path, &source.cert_path) {
            Ok(key) => {
                let key = Arc::new(key);
                match &source.host {
                    Some(host) => {
                        by_host.insert(host.clone(), key.clone());
                        if default.is_none() {
                            default = Some(key);
                        }
                    }
                    None => {
                        if default.is_none() {
                            default = Some(key);
                        }
                    }
                }
            }
            Err(e) => diag.event(format!("can't load key pair: {e}")),
        }
    }

    let default = match default {
        Some(key) => key,
        None => {
            diag.event("no usable certificate, generating self-signed fallback");
            Arc::new(self_signed_key(&["localhost".to_string()])?)
        }
    };

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SniResolver { default, by_host }));

    config.alpn_protocols = if settings.http2 {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    } else {
        vec![b"http/1.1".to_vec()]
    };

    Ok(Arc::new(config))
}
