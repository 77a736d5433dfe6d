use super::entry::{normalize_address, Proxy, ScorePolicy};
use super::probe::{HttpProbe, ProxyProbe};
use super::source::{save_addresses, sources_from_config, ProxyError, ProxySource};
use crate::config::ProxyConfig;
use futures::future::{BoxFuture, Shared};
use futures::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of a refresh as seen by every caller: the working set afterwards
type RefreshOutcome = Arc<Vec<Proxy>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Tuning knobs of a pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub policy: ScorePolicy,
    pub probe_timeout: Duration,
    pub probe_concurrency: usize,
    pub save_path: Option<PathBuf>,
}

impl PoolSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            policy: ScorePolicy::from_config(config),
            probe_timeout: config.probe_timeout(),
            probe_concurrency: config.probe_concurrency.max(1),
            save_path: config.save_path.as_ref().map(PathBuf::from),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Concurrency-safe registry of scored proxies
///
/// Cloning the pool is cheap; every clone shares the same proxies and the
/// same in-flight refresh. Map operations hold a short lock and never await.
#[derive(Clone)]
pub struct ProxyPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    proxies: Mutex<HashMap<String, Proxy>>,
    refresh: Mutex<Option<SharedRefresh>>,
    sources: Vec<Arc<dyn ProxySource>>,
    probe: Arc<dyn ProxyProbe>,
    settings: PoolSettings,
    refreshes: AtomicU64,
}

/// Clears the in-flight slot however the refresh task ends
struct InFlightGuard {
    inner: Arc<PoolInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.inner.refresh.lock() = None;
    }
}

impl ProxyPool {
    pub fn new(
        settings: PoolSettings,
        sources: Vec<Arc<dyn ProxySource>>,
        probe: Arc<dyn ProxyProbe>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                proxies: Mutex::new(HashMap::new()),
                refresh: Mutex::new(None),
                sources,
                probe,
                settings,
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Builds the pool with the configured sources and an HTTP probe
    pub fn from_config(config: &ProxyConfig, user_agent: &str, client: &Client) -> Self {
        let probe = HttpProbe::new(config.probe_url.clone(), user_agent, config.probe_timeout());
        Self::new(
            PoolSettings::from_config(config),
            sources_from_config(&config.sources, client),
            Arc::new(probe),
        )
    }

    /// Adds already validated addresses at the maximum score
    pub fn seed<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let max = self.inner.settings.policy.max_score;
        let mut proxies = self.inner.proxies.lock();
        for address in addresses {
            let address = address.into();
            proxies.insert(address.clone(), Proxy::validated(address, max));
        }
    }

    /// A random working address, or `None` when the pool is exhausted
    pub fn get_address(&self) -> Option<String> {
        let proxies = self.inner.proxies.lock();
        let working: Vec<&String> = proxies
            .values()
            .filter(|p| p.is_working)
            .map(|p| &p.address)
            .collect();
        working.choose(&mut rand::rng()).map(|a| a.to_string())
    }

    /// Records a successful request through `address`
    pub fn mark_success(&self, address: &str) {
        let mut proxies = self.inner.proxies.lock();
        if let Some(proxy) = proxies.get_mut(address) {
            self.inner.settings.policy.record_success(proxy);
        }
    }

    /// Records a failed request through `address`, evicting it below the floor
    pub fn mark_failure(&self, address: &str) {
        let mut proxies = self.inner.proxies.lock();
        let Some(proxy) = proxies.get_mut(address) else {
            return;
        };

        if self.inner.settings.policy.record_failure(proxy) {
            proxies.remove(address);
            info!(proxy = address, "Evicted proxy below score floor");
        } else {
            debug!(proxy = address, score = proxy.score, "Proxy failure recorded");
        }
    }

    /// True when no address is working or a refresh is in progress
    pub fn needs_refresh(&self) -> bool {
        self.is_refreshing() || self.working_count() == 0
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.lock().is_some()
    }

    pub fn working_count(&self) -> usize {
        self.inner
            .proxies
            .lock()
            .values()
            .filter(|p| p.is_working)
            .count()
    }

    /// Number of proxies held, working or not
    pub fn len(&self) -> usize {
        self.inner.proxies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of one proxy's state
    pub fn get(&self, address: &str) -> Option<Proxy> {
        self.inner.proxies.lock().get(address).cloned()
    }

    /// Working proxies sorted by address
    pub fn working(&self) -> Vec<Proxy> {
        self.inner.working()
    }

    /// Number of refreshes that actually ran
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::Relaxed)
    }

    /// Sources fresh candidates, validates them and replaces the working set
    ///
    /// Single-flight: while a refresh runs, further callers wait for it and
    /// receive the same outcome. A refresh whose sources all fail keeps the
    /// previous working set.
    pub async fn refresh(&self) -> Arc<Vec<Proxy>> {
        let in_flight = {
            let mut slot = self.inner.refresh.lock();
            match slot.as_ref() {
                Some(shared) => {
                    debug!("Proxy refresh already in progress, waiting for it");
                    shared.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let _guard = InFlightGuard {
                            inner: Arc::clone(&inner),
                        };
                        inner.run_refresh().await
                    });

                    let fallback = Arc::clone(&self.inner);
                    let shared = task
                        .map(move |joined| {
                            joined.unwrap_or_else(|e| {
                                error!("Proxy refresh task failed: {}", e);
                                Arc::new(fallback.working())
                            })
                        })
                        .boxed()
                        .shared();

                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        in_flight.await
    }
}

impl PoolInner {
    fn working(&self) -> Vec<Proxy> {
        let mut working: Vec<Proxy> = self
            .proxies
            .lock()
            .values()
            .filter(|p| p.is_working)
            .cloned()
            .collect();
        working.sort_by(|a, b| a.address.cmp(&b.address));
        working
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let sourced = match self.source_candidates().await {
            Ok(sourced) => sourced,
            Err(e) => {
                warn!("Proxy refresh failed, keeping current proxies: {}", e);
                return Arc::new(self.working());
            }
        };

        let mut seen = HashSet::new();
        let candidates: Vec<String> = sourced
            .into_iter()
            .chain(self.working().into_iter().map(|p| p.address))
            .filter(|address| seen.insert(address.clone()))
            .collect();

        info!("Validating {} proxy candidates", candidates.len());
        let survivors = self.validate(candidates).await;

        let max = self.settings.policy.max_score;
        let fresh: HashMap<String, Proxy> = survivors
            .into_iter()
            .map(|address| (address.clone(), Proxy::validated(address, max)))
            .collect();
        *self.proxies.lock() = fresh;

        let working = self.working();
        info!("Proxy refresh complete: {} working proxies", working.len());

        if let Some(path) = &self.settings.save_path {
            let addresses: Vec<String> = working.iter().map(|p| p.address.clone()).collect();
            if let Err(e) = save_addresses(path, &addresses).await {
                warn!("Failed to save proxies to {}: {}", path.display(), e);
            }
        }

        Arc::new(working)
    }

    /// Collects normalized addresses from every source
    ///
    /// Individual source failures are logged and skipped; the call fails
    /// only when every configured source failed.
    async fn source_candidates(&self) -> Result<Vec<String>, ProxyError> {
        let mut addresses = Vec::new();
        let mut any_succeeded = self.sources.is_empty();

        for source in &self.sources {
            match source.fetch().await {
                Ok(raw) => {
                    debug!("Proxy source {} returned {} entries", source.name(), raw.len());
                    any_succeeded = true;
                    addresses.extend(raw.iter().filter_map(|a| normalize_address(a)));
                }
                Err(e) => warn!("Proxy source {} failed: {}", source.name(), e),
            }
        }

        if any_succeeded {
            Ok(addresses)
        } else {
            Err(ProxyError::AllSourcesFailed)
        }
    }

    /// Probes candidates with bounded concurrency and a per-probe timeout
    async fn validate(&self, candidates: Vec<String>) -> Vec<String> {
        let timeout = self.settings.probe_timeout;

        stream::iter(candidates)
            .map(|address| {
                let probe = Arc::clone(&self.probe);
                async move {
                    let working = match tokio::time::timeout(timeout, probe.probe(&address)).await {
                        Ok(working) => working,
                        Err(_) => {
                            debug!(proxy = %address, "Proxy probe timed out");
                            false
                        }
                    };
                    (address, working)
                }
            })
            .buffer_unordered(self.settings.probe_concurrency)
            .filter_map(|(address, working)| async move { working.then_some(address) })
            .collect()
            .await
    }
}
