//! Crawler module: the default fetch engine and the crawl driver
//!
//! This module contains the process-level wiring around the traversal engine:
//! - HTTP fetching through optional proxies
//! - The frontier queue
//! - Session folders and run statistics
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod scheduler;
mod session;
mod stats;

pub use coordinator::{Crawler, CrawlerBuilder};
pub use fetcher::{build_http_client, user_agent_string, FetchError, Fetcher, HttpFetcher};
pub use scheduler::Frontier;
pub use session::Session;
pub use stats::CrawlStats;

use crate::config::Config;
use crate::events::EventLog;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the traversal graph
/// 2. Create the session folder and the pipeline
/// 3. Build the fetcher and, when enabled, the proxy pool
/// 4. Crawl until the frontier is drained
///
/// # Arguments
///
/// * `config` - The site configuration
/// * `config_hash` - Hash of the configuration file, recorded with the session
/// * `use_proxies` - Whether the `[proxy]` section is honoured
/// * `events` - Log to open on the session's `events.jsonl`
pub async fn crawl(
    config: Config,
    config_hash: Option<String>,
    use_proxies: bool,
    events: Option<EventLog>,
) -> Result<CrawlStats, CrawlError> {
    let mut builder = Crawler::builder(config);
    if let Some(hash) = config_hash {
        builder = builder.config_hash(hash);
    }
    if !use_proxies {
        builder = builder.disable_proxies();
    }
    if let Some(events) = events {
        builder = builder.event_log(events);
    }
    builder.build()?.run().await
}
