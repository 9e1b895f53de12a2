//! Error types for webfront.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the server surface.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("invalid route pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("failed to read certificate material from {path}: {source}")]
    CertificateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid redirect status {0}")]
    RedirectStatus(u16),

    #[error("server already started")]
    AlreadyStarted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for webfront.
pub type Result<T> = std::result::Result<T, ServerError>;
