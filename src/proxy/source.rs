//! Upstream suppliers of candidate proxy addresses
//!
//! - `TextListSource`: newline-separated list served over HTTP
//! - `FileSource`: newline-separated list in a local file
//! - `StaticSource`: addresses written in the configuration

use crate::config::ProxySourceConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors a proxy source may raise
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("HTTP error fetching proxy list from {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Proxy list at {url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("IO error reading proxy list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Every proxy source failed")]
    AllSourcesFailed,
}

/// A pluggable supplier of raw proxy address strings
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> String;

    /// Fetches the current list of raw addresses
    async fn fetch(&self) -> Result<Vec<String>, ProxyError>;
}

/// Splits a newline-separated list, skipping blank lines and `#` comments
pub fn parse_address_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Fetches a plain-text proxy list over HTTP
pub struct TextListSource {
    url: String,
    client: Client,
}

impl TextListSource {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl ProxySource for TextListSource {
    fn name(&self) -> String {
        format!("text-list {}", self.url)
    }

    async fn fetch(&self) -> Result<Vec<String>, ProxyError> {
        let http_error = |source: reqwest::Error| ProxyError::Http {
            url: self.url.clone(),
            source,
        };

        let response = self.client.get(&self.url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(http_error)?;
        let addresses = parse_address_list(&body);
        debug!("Fetched {} addresses from {}", addresses.len(), self.url);
        Ok(addresses)
    }
}

/// Reads a proxy list from a local file
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProxySource for FileSource {
    fn name(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<String>, ProxyError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_address_list(&text))
    }
}

/// Addresses fixed at construction
pub struct StaticSource {
    addresses: Vec<String>,
}

impl StaticSource {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    fn name(&self) -> String {
        "static".to_string()
    }

    async fn fetch(&self) -> Result<Vec<String>, ProxyError> {
        Ok(self.addresses.clone())
    }
}

/// Builds the configured sources
pub fn sources_from_config(configs: &[ProxySourceConfig], client: &Client) -> Vec<Arc<dyn ProxySource>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn ProxySource> {
            match config {
                ProxySourceConfig::TextList { url } => Arc::new(TextListSource::new(url.clone(), client.clone())),
                ProxySourceConfig::File { path } => Arc::new(FileSource::new(path.clone())),
                ProxySourceConfig::Static { addresses } => Arc::new(StaticSource::new(addresses.clone())),
            }
        })
        .collect()
}

/// Writes addresses one per line
pub async fn save_addresses(path: &Path, addresses: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut content = addresses.join("\n");
    content.push('\n');
    tokio::fs::write(path, content).await
}
