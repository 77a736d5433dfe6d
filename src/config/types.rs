use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// State name → list of node descriptions
pub type TraversalConfig = BTreeMap<String, Vec<NodeConfig>>;

/// State name → ordered list of processor assignments
pub type ProcessorsConfig = BTreeMap<String, Vec<ProcessorConfig>>;

/// Main configuration structure for one site
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Site name, used for the session and output folders
    pub site: String,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// State → URL the crawl starts from in that state
    #[serde(rename = "start-urls")]
    pub start_urls: BTreeMap<String, String>,

    pub traversal: TraversalConfig,

    #[serde(default)]
    pub processors: ProcessorsConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Per-request timeout (milliseconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Attempts allowed for a request after a proxy failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Response codes that count as a proxy ban
    #[serde(default = "default_ban_codes")]
    pub ban_codes: Vec<u16>,

    /// Skip items whose processors all report them as already processed
    #[serde(default = "default_true")]
    pub skip_processed: bool,

    /// Directory session folders are created in
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            ban_codes: default_ban_codes(),
            skip_processed: true,
            output_dir: default_output_dir(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Proxy pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Score cap, also the score of a freshly validated proxy
    #[serde(default = "default_max_score")]
    pub max_score: i32,

    /// Proxies scoring below this floor are evicted
    #[serde(default = "default_min_score")]
    pub min_score: i32,

    #[serde(default = "default_success_gain")]
    pub success_gain: i32,

    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: i32,

    /// URL fetched through each candidate during validation
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Per-probe timeout (milliseconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    /// Maximum number of probes in flight
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// Consecutive refreshes that may leave the pool empty before giving up
    #[serde(default = "default_max_refresh_attempts")]
    pub max_refresh_attempts: u32,

    /// File the working set is written to after each refresh
    #[serde(default)]
    pub save_path: Option<String>,

    #[serde(default)]
    pub sources: Vec<ProxySourceConfig>,
}

impl ProxyConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_score: default_max_score(),
            min_score: default_min_score(),
            success_gain: default_success_gain(),
            failure_penalty: default_failure_penalty(),
            probe_url: default_probe_url(),
            probe_timeout: default_probe_timeout(),
            probe_concurrency: default_probe_concurrency(),
            max_refresh_attempts: default_max_refresh_attempts(),
            save_path: None,
            sources: Vec::new(),
        }
    }
}

/// Upstream supplier of candidate proxy addresses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProxySourceConfig {
    /// Newline-separated `host:port` list served over HTTP
    TextList { url: String },
    /// Newline-separated list in a local file
    File { path: PathBuf },
    /// Addresses written directly in the configuration
    Static { addresses: Vec<String> },
}

/// One node description of a state: callbacks reached through the extractors
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub callbacks: Vec<String>,
    #[serde(default)]
    pub extractors: Vec<ExtractorConfig>,
}

/// Extractor class tag plus its class-specific parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractorConfig {
    pub class: String,
    #[serde(default)]
    pub params: toml::Table,
}

/// Processor class assigned to a state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProcessorConfig {
    pub class: String,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_max_concurrent_requests() -> u32 {
    16
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_ban_codes() -> Vec<u16> {
    vec![429]
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_max_score() -> i32 {
    5
}

fn default_min_score() -> i32 {
    -3
}

fn default_success_gain() -> i32 {
    1
}

fn default_failure_penalty() -> i32 {
    2
}

fn default_probe_url() -> String {
    "https://httpbingo.org/ip".to_string()
}

fn default_probe_timeout() -> u64 {
    5_000
}

fn default_probe_concurrency() -> usize {
    50
}

fn default_max_refresh_attempts() -> u32 {
    3
}

fn default_method() -> String {
    "default".to_string()
}
