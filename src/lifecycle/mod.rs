//! Lifecycle primitives.
//!
//! # Responsibilities
//! - Track outstanding work units (accept loops, in-flight requests)
//! - Let `await_stop` block until every unit has been released
//!
//! # Design Decisions
//! - Wait-group semantics: one unit per accept loop, one per in-flight
//!   request, plus one owned by the lifecycle itself and released by `stop`
//! - Guard type releases on drop so panicking tasks cannot leak units

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A join primitive in the style of a wait group.
///
/// Clones share the same counter.
#[derive(Clone, Default)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` outstanding units.
    pub fn add(&self, n: usize) {
        self.inner.count.fetch_add(n, Ordering::SeqCst);
    }

    /// Release one unit. Wakes waiters when the count reaches zero.
    pub fn done(&self) {
        let prev = self.inner.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "WaitGroup::done without matching add");
        if prev == 1 {
            self.inner.notify.notify_waiters();
        }
    }

    /// Add one unit and tie its release to the returned guard.
    pub fn guard(&self) -> WaitGuard {
        self.add(1);
        WaitGuard { wg: self.clone() }
    }

    /// Current outstanding unit count.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            if self.count() == 0 {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after registering to close the wakeup race.
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases one wait-group unit on drop.
pub struct WaitGuard {
    wg: WaitGroup,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.wg.done();
    }
}
