//! Keyed hub registry: one lazily-created hub per streaming URL.
//!
//! # Design Decisions
//! - Explicitly owned and passed into route constructors, never process
//!   global state
//! - Eviction is configurable: the historical behavior pins every key for
//!   the process lifetime, an idle timeout removes subscriber-free hubs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::EvictionPolicy;
use crate::diag::DiagnosticSink;
use crate::realtime::hub::Hub;

struct HubEntry {
    hub: Hub,
    last_used: Instant,
}

/// Mapping from routing key to its hub. Clones share the same map.
#[derive(Clone)]
pub struct HubRegistry {
    inner: Arc<RwLock<HashMap<String, HubEntry>>>,
    policy: EvictionPolicy,
    diag: DiagnosticSink,
}

impl HubRegistry {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self::with_diagnostics(policy, DiagnosticSink::default())
    }

    pub fn with_diagnostics(policy: EvictionPolicy, diag: DiagnosticSink) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            policy,
            diag,
        }
    }

    /// Hub for `key`, created on first use.
    pub async fn get_or_create(&self, key: &str) -> Hub {
        let mut hubs = self.inner.write().await;
        match hubs.get_mut(key) {
            Some(entry) => {
                entry.last_used = Instant::now();
                entry.hub.clone()
            }
            None => {
                let hub = Hub::with_diagnostics(self.diag.clone());
                hubs.insert(
                    key.to_string(),
                    HubEntry {
                        hub: hub.clone(),
                        last_used: Instant::now(),
                    },
                );
                self.diag.event(format!("created hub for key {key:?}"));
                hub
            }
        }
    }

    /// Hub for `key` if one exists.
    pub async fn lookup(&self, key: &str) -> Option<Hub> {
        let mut hubs = self.inner.write().await;
        hubs.get_mut(key).map(|entry| {
            entry.last_used = Instant::now();
            entry.hub.clone()
        })
    }

    pub async fn hub_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Remove hubs with no subscribers that have been idle past the policy
    /// timeout. No-op under [`EvictionPolicy::Never`].
    pub async fn evict_idle(&self) {
        let Some(timeout) = self.policy.idle_timeout() else {
            return;
        };
        let now = Instant::now();
        let mut hubs = self.inner.write().await;
        hubs.retain(|key, entry| {
            let keep = entry.hub.subscriber_count() > 0
                || now.duration_since(entry.last_used) <= timeout;
            if !keep {
                self.diag.event(format!("evicted idle hub for key {key:?}"));
            }
            keep
        });
    }

    /// Background eviction sweep. Returns `None` under
    /// [`EvictionPolicy::Never`].
    pub fn spawn_eviction_task(&self) -> Option<tokio::task::JoinHandle<()>> {
        let timeout = self.policy.idle_timeout()?;
        let registry = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timeout);
            loop {
                ticker.tick().await;
                registry.evict_idle().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_or_create_reuses_existing_hub() {
        let registry = HubRegistry::new(EvictionPolicy::Never);
        let hub = registry.get_or_create("/sse/topic").await;
        let mut sub = hub.register("10.0.0.1:1000");

        let same = registry.get_or_create("/sse/topic").await;
        same.broadcast("shared");
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), sub.recv())
                .await
                .unwrap(),
            Some("shared".to_string())
        );
        assert_eq!(registry.hub_count().await, 1);
    }

    #[tokio::test]
    async fn lookup_does_not_create() {
        let registry = HubRegistry::new(EvictionPolicy::Never);
        assert!(registry.lookup("/sse/none").await.is_none());
        assert_eq!(registry.hub_count().await, 0);
    }

    #[tokio::test]
    async fn never_policy_keeps_idle_hubs() {
        let registry = HubRegistry::new(EvictionPolicy::Never);
        registry.get_or_create("/sse/idle").await;
        registry.evict_idle().await;
        assert_eq!(registry.hub_count().await, 1);
        assert!(registry.spawn_eviction_task().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_policy_evicts_subscriber_free_hubs() {
        let registry = HubRegistry::new(EvictionPolicy::IdleSeconds(1));
        let busy = registry.get_or_create("/sse/busy").await;
        let _sub = busy.register("10.0.0.1:1000");
        registry.get_or_create("/sse/idle").await;

        tokio::time::advance(Duration::from_secs(2)).await;
        registry.evict_idle().await;

        assert_eq!(registry.hub_count().await, 1);
        assert!(registry.lookup("/sse/busy").await.is_some());
        assert!(registry.lookup("/sse/idle").await.is_none());
    }
}
