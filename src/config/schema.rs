//! Configuration schema definitions.
//!
//! All types derive Serde traits so a configuration can be loaded from a TOML
//! file as well as built programmatically through the [`crate::Server`]
//! surface.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Plaintext bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request header read timeout in seconds.
    ///
    /// Applies to reading each request's head, not its body: streaming
    /// responses stay open far longer than any sensible read deadline, so a
    /// whole-connection timeout would cut them off.
    pub read_timeout_secs: u64,

    /// Optional TLS listener configuration.
    pub tls: Option<TlsSettings>,

    /// Eviction policy for keyed realtime hubs.
    pub hub_eviction: EvictionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            read_timeout_secs: 60,
            tls: None,
            hub_eviction: EvictionPolicy::Never,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsSettings {
    /// Encrypted bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Offer HTTP/2 over ALPN in addition to HTTP/1.1.
    #[serde(default)]
    pub http2: bool,

    /// Certificates tried in declaration order. The first loadable one
    /// becomes the default; entries carrying a host name are selected by SNI.
    #[serde(default)]
    pub certificates: Vec<CertSource>,
}

/// One key/certificate pair on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertSource {
    /// Exact SNI host this certificate serves, if any.
    pub host: Option<String>,

    /// Path to the private key file (PEM).
    pub key_path: PathBuf,

    /// Path to the certificate file (PEM).
    pub cert_path: PathBuf,
}

/// When a keyed hub with no subscribers is removed from its registry.
///
/// `Never` pins every topic for the process lifetime, which is the historical
/// behavior; `IdleSeconds` removes hubs that stayed subscriber-free for the
/// given interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    #[default]
    Never,
    IdleSeconds(u64),
}

impl EvictionPolicy {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self {
            EvictionPolicy::Never => None,
            EvictionPolicy::IdleSeconds(secs) => Some(Duration::from_secs(*secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_plaintext_only() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert!(config.tls.is_none());
        assert_eq!(config.hub_eviction, EvictionPolicy::Never);
    }

    #[test]
    fn eviction_policy_round_trips_through_toml() {
        let toml = r#"
            bind_address = "127.0.0.1:8090"
            hub_eviction = { idle_seconds = 300 }
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.hub_eviction, EvictionPolicy::IdleSeconds(300));
        assert_eq!(
            config.hub_eviction.idle_timeout(),
            Some(Duration::from_secs(300))
        );
    }
}
