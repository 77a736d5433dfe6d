use crate::config::ProxyConfig;
use chrono::{DateTime, Utc};

/// Tracks the health of one proxy address
///
/// Proxies are owned by the pool and only change through
/// [`ScorePolicy::record_success`] and [`ScorePolicy::record_failure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    /// Proxy URL, e.g. `http://10.0.0.1:3128`
    pub address: String,

    /// Whether the proxy may be handed out
    pub is_working: bool,

    /// When the proxy was last used or validated
    pub last_checked: Option<DateTime<Utc>>,

    /// When the proxy last worked
    pub last_working: Option<DateTime<Utc>>,

    /// Health score, capped at the policy maximum
    pub score: i32,
}

impl Proxy {
    /// Creates a proxy that has not been checked yet
    pub fn new(address: impl Into<String>, score: i32) -> Self {
        Self {
            address: address.into(),
            is_working: false,
            last_checked: None,
            last_working: None,
            score,
        }
    }

    /// Creates a proxy that just passed validation
    pub fn validated(address: impl Into<String>, score: i32) -> Self {
        let mut proxy = Self::new(address, score);
        proxy.mark_working();
        proxy
    }

    /// Marks the proxy as working as of now
    pub fn mark_working(&mut self) {
        let now = Utc::now();
        self.is_working = true;
        self.last_checked = Some(now);
        self.last_working = Some(now);
    }

    /// Marks the proxy as not working as of now
    pub fn mark_not_working(&mut self) {
        self.is_working = false;
        self.last_checked = Some(Utc::now());
    }
}

/// Score thresholds and steps applied on success and failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorePolicy {
    pub max_score: i32,
    pub min_score: i32,
    pub success_gain: i32,
    pub failure_penalty: i32,
}

impl ScorePolicy {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            max_score: config.max_score,
            min_score: config.min_score,
            success_gain: config.success_gain,
            failure_penalty: config.failure_penalty,
        }
    }

    /// Raises the score, capped at the maximum, and marks the proxy working
    pub fn record_success(&self, proxy: &mut Proxy) {
        proxy.score = (proxy.score + self.success_gain).min(self.max_score);
        proxy.mark_working();
    }

    /// Lowers the score; a negative score takes the proxy out of rotation
    ///
    /// Returns true when the score fell below the floor and the proxy must
    /// be evicted.
    pub fn record_failure(&self, proxy: &mut Proxy) -> bool {
        proxy.score -= self.failure_penalty;
        if proxy.score < 0 {
            proxy.mark_not_working();
        } else {
            proxy.last_checked = Some(Utc::now());
        }
        proxy.score < self.min_score
    }
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Normalizes a raw source line into a proxy URL
///
/// Bare `host:port` entries get an `http://` scheme. Blank lines and `#`
/// comments yield `None`.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    if trimmed.contains("://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://{}", trimmed))
    }
}
