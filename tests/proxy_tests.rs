//! Integration tests for the proxy pool and the pause/resume interplay
//!
//! The network is replaced by fakes: a fetcher that records which proxy each
//! request used, sources that hand out scripted address lists and a probe
//! that accepts every candidate.

use async_trait::async_trait;
use parking_lot::Mutex;
use statewalk::config::{parse_config, Config};
use statewalk::crawler::{Crawler, FetchError, Fetcher};
use statewalk::document::Headers;
use statewalk::proxy::{PoolSettings, ProxyError, ProxyPool, ProxyProbe, ProxySource};
use statewalk::{CrawlError, FetchRequest, FetchedDocument};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

const START_PAGE: &str = r#"<a href="/a">a</a><a href="/b">b</a>"#;

/// Hands out one scripted list per call, then empty lists
struct ScriptedSource {
    lists: Mutex<VecDeque<Vec<String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(lists: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            lists: Mutex::new(
                lists
                    .iter()
                    .map(|list| list.iter().map(|a| a.to_string()).collect())
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProxySource for ScriptedSource {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self) -> Result<Vec<String>, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(self.lists.lock().pop_front().unwrap_or_default())
    }
}

struct AcceptAll;

#[async_trait]
impl ProxyProbe for AcceptAll {
    async fn probe(&self, _address: &str) -> bool {
        tokio::time::sleep(Duration::from_millis(20)).await;
        true
    }
}

/// Serves every URL; fails for proxies in `dead`, answers 429 for `banned`
///
/// `clients` mimics a per-proxy client cache: filled on fetch, pruned by
/// `retain_proxies`.
struct ProxiedFetcher {
    dead: HashSet<String>,
    banned: HashSet<String>,
    log: Mutex<Vec<(String, Option<String>)>>,
    clients: Mutex<HashSet<String>>,
}

impl ProxiedFetcher {
    fn new(dead: &[&str], banned: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            dead: dead.iter().map(|a| a.to_string()).collect(),
            banned: banned.iter().map(|a| a.to_string()).collect(),
            log: Mutex::new(Vec::new()),
            clients: Mutex::new(HashSet::new()),
        })
    }

    fn proxies_used(&self) -> Vec<Option<String>> {
        self.log.lock().iter().map(|(_, proxy)| proxy.clone()).collect()
    }
}

#[async_trait]
impl Fetcher for ProxiedFetcher {
    async fn fetch(&self, request: &FetchRequest, proxy: Option<&str>) -> Result<FetchedDocument, FetchError> {
        self.log.lock().push((request.url.clone(), proxy.map(str::to_string)));
        if let Some(proxy) = proxy {
            self.clients.lock().insert(proxy.to_string());
        }

        if proxy.is_some_and(|p| self.dead.contains(p)) {
            return Err(FetchError::Connect {
                url: request.url.clone(),
                message: "proxy refused connection".to_string(),
            });
        }

        let status = if proxy.is_some_and(|p| self.banned.contains(p)) { 429 } else { 200 };
        let url = Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        let body = if url.path() == "/" { START_PAGE } else { "<p>leaf</p>" };

        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), vec!["text/html".to_string()]);
        Ok(FetchedDocument::for_request(
            request,
            url,
            status,
            headers,
            body.as_bytes().to_vec(),
        ))
    }

    fn retain_proxies(&self, keep: &dyn Fn(&str) -> bool) {
        self.clients.lock().retain(|address| keep(address.as_str()));
    }
}

fn create_test_config(output_dir: &Path) -> Config {
    let content = format!(
        r#"
site = "proxied"

[crawler]
output-dir = "{}"
max-concurrent-requests = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[proxy]
max-refresh-attempts = 3

[start-urls]
start = "https://shop.test/"

[traversal]
start = [{{ callbacks = ["item"], extractors = [{{ class = "link_extractor" }}] }}]
item = []
"#,
        output_dir.display()
    );
    parse_config(&content).expect("test config should be valid")
}

fn create_pool(source: Arc<ScriptedSource>) -> ProxyPool {
    let settings = PoolSettings {
        probe_timeout: Duration::from_millis(500),
        ..PoolSettings::default()
    };
    ProxyPool::new(settings, vec![source], Arc::new(AcceptAll))
}

#[tokio::test]
async fn test_empty_pool_refreshed_before_first_request() {
    let temp = TempDir::new().unwrap();
    let source = ScriptedSource::new(&[&["10.0.0.1:80", "10.0.0.2:80"]]);
    let pool = create_pool(source.clone());
    let fetcher = ProxiedFetcher::new(&[], &[]);

    let crawler = Crawler::builder(create_test_config(temp.path()))
        .fetcher(fetcher.clone())
        .proxy_pool(pool.clone())
        .build()
        .unwrap();
    let stats = crawler.run().await.unwrap();

    assert_eq!(stats.documents, 3);
    assert_eq!(stats.proxy_refreshes, 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let used = fetcher.proxies_used();
    assert_eq!(used.len(), 3);
    assert!(used
        .iter()
        .all(|p| matches!(p.as_deref(), Some("http://10.0.0.1:80") | Some("http://10.0.0.2:80"))));
    assert!(!crawler.gate().is_paused());
}

#[tokio::test]
async fn test_repeated_empty_refreshes_abort_the_crawl() {
    let temp = TempDir::new().unwrap();
    let source = ScriptedSource::new(&[]);
    let fetcher = ProxiedFetcher::new(&[], &[]);

    let crawler = Crawler::builder(create_test_config(temp.path()))
        .fetcher(fetcher.clone())
        .proxy_pool(create_pool(source.clone()))
        .build()
        .unwrap();
    let result = crawler.run().await;

    assert!(matches!(result, Err(CrawlError::ProxiesExhausted { attempts: 3 })));
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert!(fetcher.proxies_used().is_empty());
    assert!(!crawler.gate().is_paused());
}

#[tokio::test]
async fn test_failing_proxy_replaced_by_refresh() {
    let temp = TempDir::new().unwrap();
    let source = ScriptedSource::new(&[&["dead:80"], &["good:80"]]);
    let pool = create_pool(source.clone());
    let fetcher = ProxiedFetcher::new(&["http://dead:80"], &[]);

    let crawler = Crawler::builder(create_test_config(temp.path()))
        .fetcher(fetcher.clone())
        .proxy_pool(pool.clone())
        .build()
        .unwrap();
    let stats = crawler.run().await.unwrap();

    // 5 -> 3 -> 1 -> -1: the third failure takes the proxy out of rotation
    let used = fetcher.proxies_used();
    assert_eq!(&used[..3], &vec![Some("http://dead:80".to_string()); 3][..]);
    assert!(used[3..].iter().all(|p| p.as_deref() == Some("http://good:80")));

    assert_eq!(stats.documents, 3);
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.proxy_refreshes, 2);
    assert!(pool.get("http://dead:80").is_none());
    assert_eq!(pool.get_address().as_deref(), Some("http://good:80"));

    // the dead proxy's client was dropped once the refresh replaced it
    let clients: Vec<String> = fetcher.clients.lock().iter().cloned().collect();
    assert_eq!(clients, vec!["http://good:80".to_string()]);
}

#[tokio::test]
async fn test_banned_proxy_loses_score() {
    let temp = TempDir::new().unwrap();
    let source = ScriptedSource::new(&[&["banned:80"], &["good:80"]]);
    let pool = create_pool(source.clone());
    let fetcher = ProxiedFetcher::new(&[], &["http://banned:80"]);

    let crawler = Crawler::builder(create_test_config(temp.path()))
        .fetcher(fetcher.clone())
        .proxy_pool(pool.clone())
        .build()
        .unwrap();
    let stats = crawler.run().await.unwrap();

    assert_eq!(stats.bans, 3);
    assert_eq!(stats.documents, 3);
    assert!(pool.get("http://banned:80").is_none());
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_sourcing_call() {
    let source = ScriptedSource::new(&[&["10.0.0.1:80"], &["10.0.0.9:80"]]);
    let pool = create_pool(source.clone());

    let (first, second) = tokio::join!(pool.refresh(), pool.refresh());

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].address, "http://10.0.0.1:80");
}
