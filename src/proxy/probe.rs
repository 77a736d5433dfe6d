use crate::crawler::build_http_client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Checks whether a proxy address currently works
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    async fn probe(&self, address: &str) -> bool;
}

/// Fetches a probe URL through the proxy; a 200 answer means working
pub struct HttpProbe {
    probe_url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(probe_url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_url: probe_url.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProxyProbe for HttpProbe {
    async fn probe(&self, address: &str) -> bool {
        let client = match build_http_client(&self.user_agent, self.timeout, Some(address)) {
            Ok(client) => client,
            Err(e) => {
                trace!("Cannot build client for proxy {}: {}", address, e);
                return false;
            }
        };

        match client.get(&self.probe_url).send().await {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                trace!("Probe through {} failed: {}", address, e);
                false
            }
        }
    }
}
