use super::gate::IssuanceGate;
use crate::proxy::{Proxy, ProxyPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Pauses request issuance while the proxy pool refreshes
///
/// The only state is the `refreshing` flag, which keeps a second trigger
/// from pausing again while a refresh is running. Issuance resumes when the
/// refresh task ends, whatever its outcome.
#[derive(Clone)]
pub struct RefreshCoordinator {
    pool: ProxyPool,
    gate: IssuanceGate,
    refreshing: Arc<AtomicBool>,
}

/// Clears the flag, then reopens the gate, even if the refresh task panics
struct ResumeOnDrop {
    refreshing: Arc<AtomicBool>,
    gate: IssuanceGate,
}

impl Drop for ResumeOnDrop {
    fn drop(&mut self) {
        self.refreshing.store(false, Ordering::SeqCst);
        self.gate.resume();
    }
}

impl RefreshCoordinator {
    pub fn new(pool: ProxyPool, gate: IssuanceGate) -> Self {
        Self {
            pool,
            gate,
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn gate(&self) -> &IssuanceGate {
        &self.gate
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Called when the dispatcher has nothing to do
    ///
    /// Starts a refresh only if the pool has no working address.
    pub fn on_idle(&self) -> Option<JoinHandle<Arc<Vec<Proxy>>>> {
        if self.pool.needs_refresh() {
            self.trigger("idle")
        } else {
            None
        }
    }

    /// Called when a request could not get a proxy
    pub fn on_exhausted(&self) -> Option<JoinHandle<Arc<Vec<Proxy>>>> {
        self.trigger("exhausted")
    }

    /// Pauses issuance and refreshes the pool in a background task
    ///
    /// Returns `None` when a refresh started here is already running.
    pub fn trigger(&self, reason: &str) -> Option<JoinHandle<Arc<Vec<Proxy>>>> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!(reason, "Refresh already running, not pausing again");
            return None;
        }

        self.gate.pause();
        info!(reason, "Pausing request issuance for proxy refresh");

        let guard = ResumeOnDrop {
            refreshing: Arc::clone(&self.refreshing),
            gate: self.gate.clone(),
        };
        let pool = self.pool.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            let working = pool.refresh().await;
            info!("Resuming request issuance with {} working proxies", working.len());
            working
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{PoolSettings, ProxyProbe, ProxySource, StaticSource};
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowProbe;

    #[async_trait]
    impl ProxyProbe for SlowProbe {
        async fn probe(&self, _address: &str) -> bool {
            tokio::time::sleep(Duration::from_millis(50)).await;
            true
        }
    }

    fn coordinator(addresses: &[&str]) -> RefreshCoordinator {
        let source: Arc<dyn ProxySource> =
            Arc::new(StaticSource::new(addresses.iter().map(|a| a.to_string()).collect()));
        let pool = ProxyPool::new(PoolSettings::default(), vec![source], Arc::new(SlowProbe));
        RefreshCoordinator::new(pool, IssuanceGate::new())
    }

    #[tokio::test]
    async fn test_trigger_pauses_then_resumes() {
        let coordinator = coordinator(&["10.0.0.1:80"]);

        let handle = coordinator.trigger("test").unwrap();
        assert!(coordinator.gate().is_paused());
        assert!(coordinator.is_refreshing());

        let working = handle.await.unwrap();
        assert_eq!(working.len(), 1);
        assert!(!coordinator.gate().is_paused());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_second_trigger_does_not_pause_again() {
        let coordinator = coordinator(&["10.0.0.1:80"]);

        let handle = coordinator.on_exhausted().unwrap();
        assert!(coordinator.on_exhausted().is_none());

        handle.await.unwrap();
        assert!(!coordinator.gate().is_paused());
    }

    #[tokio::test]
    async fn test_resumes_even_when_refresh_finds_nothing() {
        let coordinator = coordinator(&[]);

        let working = coordinator.trigger("test").unwrap().await.unwrap();
        assert!(working.is_empty());
        assert!(!coordinator.gate().is_paused());
    }

    #[tokio::test]
    async fn test_idle_refreshes_only_when_needed() {
        let coordinator = coordinator(&["10.0.0.1:80"]);

        coordinator.on_idle().unwrap().await.unwrap();
        assert!(coordinator.on_idle().is_none());
    }
}
