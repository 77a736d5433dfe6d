//! HTTP fetcher implementation
//!
//! This module handles all outbound requests of a crawl:
//! - Building HTTP clients with the crawler's user agent, optionally proxied
//! - Caching one client per proxy address
//! - Turning responses into [`FetchedDocument`]s
//! - Classifying transport errors

use crate::config::UserAgentConfig;
use crate::document::{FetchRequest, FetchedDocument, Headers};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a fetch engine
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid proxy {proxy}: {message}")]
    Proxy { proxy: String, message: String },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if error.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Whether the error says something about the proxy the request used
    pub fn is_network(&self) -> bool {
        !matches!(self, FetchError::InvalidUrl { .. })
    }
}

/// Fetch engine consumed by the crawler
///
/// A fetcher is a pure dispatcher: it performs one request and reports what
/// came back, leaving retries and proxy bookkeeping to the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, proxy: Option<&str>) -> Result<FetchedDocument, FetchError>;

    /// Drops per-proxy state for every address `keep` rejects
    ///
    /// Called when proxies leave the pool, after evictions and refreshes.
    fn retain_proxies(&self, _keep: &dyn Fn(&str) -> bool) {}
}

/// Formats the user agent as `Name/Version (+url; email)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client, optionally routing every request through a proxy
///
/// # Arguments
///
/// * `user_agent` - The formatted user agent string
/// * `timeout` - Total timeout for a request
/// * `proxy` - Proxy URL such as `http://10.0.0.1:3128`
///
/// # Example
///
/// ```no_run
/// use statewalk::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("Statewalk/1.0", Duration::from_secs(30), None).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// reqwest-backed fetcher with one client per proxy address
pub struct HttpFetcher {
    user_agent: String,
    timeout: Duration,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpFetcher {
    pub fn new(user_agent: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let user_agent = user_agent_string(user_agent);
        let direct = build_http_client(&user_agent, timeout, None)?;
        Ok(Self {
            user_agent,
            timeout,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// The client without a proxy, also used for proxy list downloads
    pub fn client(&self) -> &Client {
        &self.direct
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Number of proxy clients currently cached
    pub fn cached_proxy_clients(&self) -> usize {
        self.proxied.lock().len()
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut proxied = self.proxied.lock();
        if let Some(client) = proxied.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.user_agent, self.timeout, Some(proxy)).map_err(|e| FetchError::Proxy {
            proxy: proxy.to_string(),
            message: e.to_string(),
        })?;
        proxied.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest, proxy: Option<&str>) -> Result<FetchedDocument, FetchError> {
        let url = Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        let client = self.client_for(proxy)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_default()
                    .push(value.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?;

        tracing::debug!(url = %final_url, status, bytes = body.len(), "Fetched");
        Ok(FetchedDocument::for_request(request, final_url, status, headers, body.to_vec()))
    }

    fn retain_proxies(&self, keep: &dyn Fn(&str) -> bool) {
        let mut proxied = self.proxied.lock();
        let before = proxied.len();
        proxied.retain(|address, _| keep(address.as_str()));
        if proxied.len() < before {
            tracing::debug!("Dropped {} proxy client(s)", before - proxied.len());
        }
    }
}
