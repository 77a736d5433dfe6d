//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Seeding the frontier with the start URLs
//! - Dispatching fetches with bounded concurrency while the gate is open
//! - Acquiring a proxy per request and reporting the outcome to the pool
//! - Retrying requests after proxy failures and ban responses
//! - Feeding documents to the strategy and items to the pipeline
//! - Pausing for proxy refreshes and giving up when refreshes stay empty

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, user_agent_string, Fetcher, HttpFetcher};
use crate::crawler::scheduler::Frontier;
use crate::crawler::session::Session;
use crate::crawler::stats::CrawlStats;
use crate::document::{FetchRequest, FetchedDocument};
use crate::engine::{CrawlStrategy, IssuanceGate, Output, RefreshCoordinator};
use crate::events::EventLog;
use crate::extract::ExtractorRegistry;
use crate::graph::TraversalGraph;
use crate::pipeline::{Pipeline, ProcessorContext, ProcessorRegistry};
use crate::proxy::{Proxy, ProxyPool};
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// What one dispatched request came back with
enum Completion {
    /// A document was handled; carries its follow-up requests
    Handled {
        requests: Vec<FetchRequest>,
        items_processed: u64,
        items_skipped: u64,
    },
    /// The document's extractors failed
    ExtractFailed,
    /// Network error or ban response; the request may be tried again
    Retry { request: FetchRequest, banned: bool },
    /// The request cannot succeed
    Failed,
}

/// Shared by every fetch task
struct TaskContext {
    fetcher: Arc<dyn Fetcher>,
    strategy: Arc<CrawlStrategy>,
    pipeline: Arc<Pipeline>,
    proxies: Option<ProxyPool>,
    ban_codes: Vec<u16>,
    skip_processed: bool,
}

/// Builder for [`Crawler`]
pub struct CrawlerBuilder {
    config: Config,
    config_hash: Option<String>,
    fetcher: Option<Arc<dyn Fetcher>>,
    proxy_pool: Option<ProxyPool>,
    use_proxies: bool,
    extractors: ExtractorRegistry,
    processors: ProcessorRegistry,
    event_log: Option<EventLog>,
}

impl CrawlerBuilder {
    /// Hash recorded in the session's `meta.json`
    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Replaces the default reqwest fetcher
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Uses this pool instead of one built from the `[proxy]` section
    pub fn proxy_pool(mut self, pool: ProxyPool) -> Self {
        self.proxy_pool = Some(pool);
        self
    }

    /// Fetches directly even if proxies are configured
    pub fn disable_proxies(mut self) -> Self {
        self.use_proxies = false;
        self
    }

    pub fn extractors(mut self, registry: ExtractorRegistry) -> Self {
        self.extractors = registry;
        self
    }

    pub fn processors(mut self, registry: ProcessorRegistry) -> Self {
        self.processors = registry;
        self
    }

    /// Opens `events.jsonl` in the session folder for this log
    pub fn event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Builds the graph, creates the session folder and assembles the pipeline
    ///
    /// Graph errors are raised before anything touches the disk or network.
    pub fn build(self) -> Result<Crawler, CrawlError> {
        let config = self.config;
        let graph = TraversalGraph::build(&config.traversal, &self.extractors)?;
        info!(
            "Traversal graph: {} states, {} edges, {} extractors",
            graph.states().count(),
            graph.edge_count(),
            graph.extractor_count()
        );

        let session = Session::create(
            Path::new(&config.crawler.output_dir),
            &config,
            self.config_hash.as_deref(),
        )?;
        if let Some(log) = &self.event_log {
            log.open(&session.events_path())?;
        }
        let context = ProcessorContext {
            site: config.site.clone(),
            session_dir: session.dir.clone(),
        };
        let pipeline = Pipeline::from_config(&config.processors, &self.processors, &context)?;

        let user_agent = user_agent_string(&config.user_agent);
        let timeout = config.crawler.request_timeout();
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&config.user_agent, timeout)?),
        };

        let proxies = match (self.use_proxies, self.proxy_pool) {
            (false, _) => None,
            (true, Some(pool)) => Some(pool),
            (true, None) if config.proxy.enabled => {
                let client = build_http_client(&user_agent, timeout, None)?;
                Some(ProxyPool::from_config(&config.proxy, &user_agent, &client))
            }
            (true, None) => None,
        };

        let gate = IssuanceGate::new();
        let refresher = proxies
            .as_ref()
            .map(|pool| RefreshCoordinator::new(pool.clone(), gate.clone()));

        Ok(Crawler {
            config: Arc::new(config),
            session,
            strategy: Arc::new(CrawlStrategy::new(Arc::new(graph))),
            pipeline: Arc::new(pipeline),
            fetcher,
            proxies,
            refresher,
            gate,
        })
    }
}

/// Main crawler structure
pub struct Crawler {
    config: Arc<Config>,
    session: Session,
    strategy: Arc<CrawlStrategy>,
    pipeline: Arc<Pipeline>,
    fetcher: Arc<dyn Fetcher>,
    proxies: Option<ProxyPool>,
    refresher: Option<RefreshCoordinator>,
    gate: IssuanceGate,
}

impl Crawler {
    pub fn builder(config: Config) -> CrawlerBuilder {
        CrawlerBuilder {
            config,
            config_hash: None,
            fetcher: None,
            proxy_pool: None,
            use_proxies: true,
            extractors: ExtractorRegistry::default(),
            processors: ProcessorRegistry::default(),
            event_log: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn strategy(&self) -> &CrawlStrategy {
        &self.strategy
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn proxy_pool(&self) -> Option<&ProxyPool> {
        self.proxies.as_ref()
    }

    pub fn gate(&self) -> &IssuanceGate {
        &self.gate
    }

    /// Runs the crawl until the frontier is drained
    ///
    /// # Errors
    ///
    /// `ProxiesExhausted` when `max-refresh-attempts` consecutive refreshes
    /// leave the proxy pool without a working address.
    pub async fn run(&self) -> Result<CrawlStats, CrawlError> {
        let start_time = Instant::now();
        let max_in_flight = self.config.crawler.max_concurrent_requests.max(1) as usize;
        let max_refresh_attempts = self.config.proxy.max_refresh_attempts.max(1);

        let mut stats = CrawlStats::default();
        let mut frontier = Frontier::new();
        let starts = self.strategy.start_requests(&self.config.start_urls);
        stats.requests_enqueued += starts.len() as u64;
        frontier.extend(starts);

        info!(
            "Starting crawl of '{}' with {} start URL(s)",
            self.config.site,
            frontier.len()
        );

        let context = Arc::new(TaskContext {
            fetcher: Arc::clone(&self.fetcher),
            strategy: Arc::clone(&self.strategy),
            pipeline: Arc::clone(&self.pipeline),
            proxies: self.proxies.clone(),
            ban_codes: self.config.crawler.ban_codes.clone(),
            skip_processed: self.config.crawler.skip_processed,
        });

        let mut in_flight: JoinSet<Completion> = JoinSet::new();
        let mut refresh: Option<JoinHandle<Arc<Vec<Proxy>>>> = self.refresher.as_ref().and_then(|r| r.on_idle());
        let mut empty_refreshes = 0u32;

        loop {
            // Dispatch while the gate is open and slots are free
            while in_flight.len() < max_in_flight && !frontier.is_empty() && !self.gate.is_paused() {
                let proxy = match &self.proxies {
                    None => None,
                    Some(pool) => match pool.get_address() {
                        Some(address) => Some(address),
                        None => {
                            debug!("No working proxy, requesting a refresh");
                            if let Some(handle) = self.refresher.as_ref().and_then(|r| r.on_exhausted()) {
                                refresh = Some(handle);
                            }
                            break;
                        }
                    },
                };

                let Some(request) = frontier.pop() else {
                    break;
                };
                debug!(url = %request.url, state = %request.state, proxy = ?proxy, "Dispatching");
                in_flight.spawn(execute(Arc::clone(&context), request, proxy));
            }

            if in_flight.is_empty() {
                if frontier.is_empty() {
                    info!("Frontier is empty, crawl complete");
                    break;
                }

                match refresh.take() {
                    Some(mut handle) => {
                        let working = await_refresh(&mut handle).await;
                        self.check_refresh(&working, &mut empty_refreshes, max_refresh_attempts, &mut stats)?;
                    }
                    None => self.gate.wait_until_open().await,
                }
                continue;
            }

            tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    match joined {
                        Ok(completion) => self.apply(completion, &mut frontier, &mut stats),
                        Err(e) => {
                            error!("Fetch task failed: {}", e);
                            stats.failed_requests += 1;
                        }
                    }
                }
                Some(working) = async {
                    match refresh.as_mut() {
                        Some(handle) => Some(await_refresh(handle).await),
                        None => None,
                    }
                }, if refresh.is_some() => {
                    refresh = None;
                    self.check_refresh(&working, &mut empty_refreshes, max_refresh_attempts, &mut stats)?;
                }
            }

            let done = stats.documents + stats.failed_requests;
            if done > 0 && done % 50 == 0 {
                info!(
                    "Progress: {} documents, {} in frontier, {} in flight",
                    stats.documents,
                    frontier.len(),
                    in_flight.len()
                );
            }
        }

        stats.elapsed = start_time.elapsed();
        info!(
            "Crawl completed: {} documents, {} items processed in {:?}",
            stats.documents, stats.items_processed, stats.elapsed
        );
        Ok(stats)
    }

    fn apply(&self, completion: Completion, frontier: &mut Frontier, stats: &mut CrawlStats) {
        match completion {
            Completion::Handled {
                requests,
                items_processed,
                items_skipped,
            } => {
                stats.documents += 1;
                stats.items_processed += items_processed;
                stats.items_skipped += items_skipped;
                stats.requests_enqueued += requests.len() as u64;
                frontier.extend(requests);
            }
            Completion::ExtractFailed => {
                stats.documents += 1;
                stats.extract_errors += 1;
            }
            Completion::Retry { request, banned } => {
                if banned {
                    stats.bans += 1;
                }
                if request.attempt < self.config.crawler.max_retries {
                    stats.retries += 1;
                    frontier.push_front(request.retry());
                } else {
                    warn!(url = %request.url, attempts = request.attempt + 1, "Giving up on request");
                    stats.failed_requests += 1;
                }
            }
            Completion::Failed => stats.failed_requests += 1,
        }
    }

    fn check_refresh(
        &self,
        working: &[Proxy],
        empty_refreshes: &mut u32,
        max_attempts: u32,
        stats: &mut CrawlStats,
    ) -> Result<(), CrawlError> {
        stats.proxy_refreshes += 1;
        if let Some(pool) = &self.proxies {
            self.fetcher.retain_proxies(&|address| pool.get(address).is_some());
        }
        if !working.is_empty() {
            *empty_refreshes = 0;
            return Ok(());
        }

        *empty_refreshes += 1;
        warn!(
            "Proxy refresh found no working proxy ({}/{})",
            empty_refreshes, max_attempts
        );
        if *empty_refreshes >= max_attempts {
            error!("Giving up: no working proxy after {} refreshes", empty_refreshes);
            return Err(CrawlError::ProxiesExhausted {
                attempts: *empty_refreshes,
            });
        }
        Ok(())
    }
}

async fn await_refresh(handle: &mut JoinHandle<Arc<Vec<Proxy>>>) -> Arc<Vec<Proxy>> {
    match handle.await {
        Ok(working) => working,
        Err(e) => {
            error!("Proxy refresh task failed: {}", e);
            Arc::new(Vec::new())
        }
    }
}

/// Fetches one request and handles its document
async fn execute(context: Arc<TaskContext>, request: FetchRequest, proxy: Option<String>) -> Completion {
    let result = context.fetcher.fetch(&request, proxy.as_deref()).await;

    match result {
        Ok(document) if context.ban_codes.contains(&document.status) => {
            warn!(url = %request.url, status = document.status, proxy = ?proxy, "Ban response");
            report_failure(&context, proxy.as_deref());
            Completion::Retry { request, banned: true }
        }
        Ok(document) => {
            if let (Some(pool), Some(address)) = (&context.proxies, proxy.as_deref()) {
                pool.mark_success(address);
            }
            handle_document(&context, document).await
        }
        Err(e) if e.is_network() => {
            warn!(url = %request.url, proxy = ?proxy, "Fetch failed: {}", e);
            report_failure(&context, proxy.as_deref());
            Completion::Retry { request, banned: false }
        }
        Err(e) => {
            warn!(url = %request.url, "Dropping request: {}", e);
            Completion::Failed
        }
    }
}

fn report_failure(context: &TaskContext, proxy: Option<&str>) {
    if let (Some(pool), Some(address)) = (&context.proxies, proxy) {
        pool.mark_failure(address);
        if pool.get(address).is_none() {
            context.fetcher.retain_proxies(&|address| pool.get(address).is_some());
        }
    }
}

async fn handle_document(context: &TaskContext, document: FetchedDocument) -> Completion {
    let outputs = match context.strategy.on_document(&document) {
        Ok(outputs) => outputs,
        Err(e) => {
            warn!(url = %document.url, state = ?document.state, "Extraction failed: {}", e);
            return Completion::ExtractFailed;
        }
    };

    let mut requests = Vec::new();
    let mut items_processed = 0;
    let mut items_skipped = 0;

    for output in outputs {
        match output {
            Output::Request(request) => requests.push(request),
            Output::Item(item) => {
                if context.skip_processed && context.pipeline.already_processed(&item) {
                    items_skipped += 1;
                    continue;
                }

                let pipeline = Arc::clone(&context.pipeline);
                let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
                let task = move || tracing::dispatcher::with_default(&dispatch, || pipeline.process(item));
                match tokio::task::spawn_blocking(task).await {
                    Ok(_) => items_processed += 1,
                    Err(e) => error!("Pipeline task failed: {}", e),
                }
            }
        }
    }

    Completion::Handled {
        requests,
        items_processed,
        items_skipped,
    }
}
