use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::{PageFetcher, RawPage};

/// Blocking-style fetcher: one request at a time, fixed pause after each.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    delay: Duration,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed for {}", url))?;
        resp.error_for_status()
            .with_context(|| format!("Bad status for {}", url))
    }

    /// Sleep for the configured delay. No jitter, no backoff.
    async fn polite_delay(&self) {
        sleep(self.delay).await;
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<RawPage> {
        let result = match self.get(url).await {
            Ok(resp) => resp
                .bytes()
                .await
                .map(|b| RawPage::new(url, b.to_vec()))
                .with_context(|| format!("Failed to read body of {}", url)),
            Err(e) => Err(e),
        };
        self.polite_delay().await;
        result
    }
}
