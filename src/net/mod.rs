//! Network plumbing: accept loops and TLS configuration.

pub mod listener;
pub mod tls;
