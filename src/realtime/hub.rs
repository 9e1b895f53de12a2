//! The broadcast hub for one logical streaming channel.
//!
//! # Design Decisions
//! - Exactly one task owns the subscriber set; registration, removal, and
//!   broadcast all flow through its single command queue, so they are
//!   totally ordered and the set needs no locking
//! - Subscriber delivery queues are small and bounded; a full queue drops
//!   the message for that subscriber instead of stalling the owner task
//! - Remote addresses are flagged inactive on unregister, never removed,
//!   preserving history for `client_details`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::diag::DiagnosticSink;

/// Bounded delivery-queue capacity per subscriber.
pub const SUBSCRIBER_QUEUE: usize = 16;

enum Command {
    Register {
        id: u64,
        tx: mpsc::Sender<String>,
        addr: String,
    },
    Unregister {
        id: u64,
        addr: String,
    },
    Broadcast(String),
    Details(oneshot::Sender<ClientDetails>),
}

/// Subscriber bookkeeping reported by [`Hub::client_details`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDetails {
    /// Number of currently-active addresses.
    pub active: usize,
    /// Every address ever seen, with its current active flag.
    pub addresses: Vec<(String, bool)>,
}

/// Handle to a broadcast hub. Clones address the same owner task.
#[derive(Clone)]
pub struct Hub {
    cmd: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    subscribers: Arc<AtomicUsize>,
    diag: DiagnosticSink,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_diagnostics(DiagnosticSink::default())
    }

    pub fn with_diagnostics(diag: DiagnosticSink) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(owner_task(cmd_rx, diag.clone()));
        Self {
            cmd: cmd_tx,
            next_id: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(AtomicUsize::new(0)),
            diag,
        }
    }

    /// Register a new subscriber delivering to a bounded queue.
    pub fn register(&self, addr: impl Into<String>) -> Subscriber {
        let addr = addr.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.subscribers.fetch_add(1, Ordering::Relaxed);
        // The owner task may already be gone during teardown; the subscriber
        // then just never receives anything.
        let _ = self.cmd.send(Command::Register {
            id,
            tx,
            addr: addr.clone(),
        });
        Subscriber {
            id,
            addr,
            rx,
            cmd: self.cmd.clone(),
            subscribers: self.subscribers.clone(),
        }
    }

    /// Queue a message for every currently-registered subscriber.
    pub fn broadcast(&self, message: impl Into<String>) {
        if self.cmd.send(Command::Broadcast(message.into())).is_err() {
            self.diag.event("broadcast to torn-down hub");
        }
    }

    /// Subscriber count and historical address list.
    pub async fn client_details(&self) -> ClientDetails {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd.send(Command::Details(reply_tx)).is_err() {
            return ClientDetails {
                active: 0,
                addresses: Vec::new(),
            };
        }
        reply_rx.await.unwrap_or(ClientDetails {
            active: 0,
            addresses: Vec::new(),
        })
    }

    /// Currently-registered subscriber count, tracked outside the owner
    /// task so registry eviction can read it synchronously.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

async fn owner_task(mut cmd_rx: mpsc::UnboundedReceiver<Command>, diag: DiagnosticSink) {
    let mut clients: HashMap<u64, mpsc::Sender<String>> = HashMap::new();
    let mut addresses: HashMap<String, bool> = HashMap::new();

    while let Some(command) = cmd_rx.recv().await {
        match command {
            Command::Register { id, tx, addr } => {
                clients.insert(id, tx);
                addresses.insert(addr, true);
                diag.event("added new client");
            }
            Command::Unregister { id, addr } => {
                clients.remove(&id);
                addresses.insert(addr, false);
                diag.event("removed client");
            }
            Command::Broadcast(message) => {
                for tx in clients.values() {
                    match tx.try_send(message.clone()) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            diag.event("subscriber queue full, message dropped");
                        }
                        // Receiver already gone; its unregister is in flight.
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
                diag.event(format!(
                    "broadcast {message:?} to {} clients",
                    clients.len()
                ));
            }
            Command::Details(reply) => {
                let active = addresses.values().filter(|active| **active).count();
                let mut listed: Vec<(String, bool)> = addresses
                    .iter()
                    .map(|(addr, active)| (addr.clone(), *active))
                    .collect();
                listed.sort();
                let _ = reply.send(ClientDetails {
                    active,
                    addresses: listed,
                });
            }
        }
    }
}

/// One subscriber's delivery channel. Unregisters itself on drop.
pub struct Subscriber {
    id: u64,
    addr: String,
    rx: mpsc::Receiver<String>,
    cmd: mpsc::UnboundedSender<Command>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscriber {
    /// Next broadcast message; `None` once the hub is torn down.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::Relaxed);
        let _ = self.cmd.send(Command::Unregister {
            id: self.id,
            addr: self.addr.clone(),
        });
    }
}
