//! Diagnostic event plumbing.
//!
//! # Responsibilities
//! - Carry free-text operational events from all subsystems
//! - Deliver them to an injected queue when one exists
//! - Fall back to synchronous `tracing` output otherwise
//!
//! # Design Decisions
//! - Injected, not a process-wide singleton; every subsystem holds a clone
//! - Unbounded channel so emitters never block on a slow consumer
//! - Default sink is `tracing` so events are never silently lost

use tokio::sync::mpsc;

/// Destination for operational log events.
///
/// Cloning is cheap; all clones feed the same receiver. A default-constructed
/// sink has no receiver and reports through `tracing` instead.
#[derive(Clone, Default)]
pub struct DiagnosticSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl DiagnosticSink {
    /// Create a sink backed by a channel, returning the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Record one event.
    pub fn event(&self, msg: impl Into<String>) {
        let msg = msg.into();
        match &self.tx {
            Some(tx) => {
                // Receiver dropped: degrade to the default sink.
                if tx.send(msg.clone()).is_err() {
                    tracing::info!(target: "webfront", "{msg}");
                }
            }
            None => tracing::info!(target: "webfront", "{msg}"),
        }
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("channel", &self.tx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_events() {
        let (sink, mut rx) = DiagnosticSink::channel();
        sink.event("first");
        sink.clone().event("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[test]
    fn default_sink_does_not_panic() {
        DiagnosticSink::default().event("goes to tracing");
    }
}
