pub mod local;
pub mod s3;
pub mod sink;
pub mod sqs;

use crate::config::{AppConfig, StorageBackend};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use self::local::LocalStore;
use self::s3::S3Store;
use self::sqs::SqsQueue;

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Flat bucket/key object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `None` when the object does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
}

/// FIFO-ish message queue with visibility timeouts.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, body: &str) -> Result<String>;

    /// Returned messages stay on the queue, hidden until their visibility
    /// timeout runs out. An empty batch means the queue is drained.
    async fn receive(&self) -> Result<Vec<QueueMessage>>;

    async fn delete(&self, receipt: &str) -> Result<()>;
}

/// Open the configured backend.
pub async fn connect(config: &AppConfig) -> Result<(Arc<dyn ObjectStore>, Arc<dyn MessageQueue>)> {
    match config.storage.backend {
        StorageBackend::S3 => {
            let sdk = s3::load_sdk_config(&config.storage).await;
            let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&sdk, &config.storage));
            let queue_url = config
                .queue
                .url
                .clone()
                .context("queue.url must be set for the s3 backend")?;
            let queue: Arc<dyn MessageQueue> =
                Arc::new(SqsQueue::new(&sdk, queue_url, &config.queue));
            Ok((store, queue))
        }
        StorageBackend::Local => {
            let local = Arc::new(
                LocalStore::open(&config.storage.db_path, config.queue.clone())
                    .context("Failed to open local store")?,
            );
            local.run_migrations()?;
            let store: Arc<dyn ObjectStore> = local.clone();
            let queue: Arc<dyn MessageQueue> = local;
            Ok((store, queue))
        }
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

/// Newline-delimited list of links already fully processed, kept as one
/// object. Appending rewrites the whole object; it is not safe under
/// concurrent writers.
pub struct Ledger {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
}

impl Ledger {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    async fn read_lines(&self) -> Result<Vec<String>> {
        let body = self
            .store
            .get(&self.bucket, &self.key)
            .await
            .with_context(|| format!("Failed to read ledger {}/{}", self.bucket, self.key))?;
        let Some(body) = body else {
            info!("No ledger at {}/{}, starting empty", self.bucket, self.key);
            return Ok(Vec::new());
        };
        let text = String::from_utf8(body).context("Ledger is not UTF-8")?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn read(&self) -> Result<HashSet<String>> {
        Ok(self.read_lines().await?.into_iter().collect())
    }

    pub async fn append(&self, links: &[String]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let mut lines = self.read_lines().await?;
        lines.extend(links.iter().cloned());
        self.store
            .put(&self.bucket, &self.key, lines.join("\n").into_bytes())
            .await
            .with_context(|| format!("Failed to write ledger {}/{}", self.bucket, self.key))?;
        debug!("Ledger now holds {} links", lines.len());
        Ok(())
    }
}

// ── Pending snapshot ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ClaimedLink {
    match_link: String,
}

/// Links currently claimed by messages on the queue. Receives until an empty
/// batch, or one made only of messages already seen, comes back; nothing is
/// deleted.
pub async fn inflight_links(queue: &dyn MessageQueue) -> Result<HashSet<String>> {
    let mut links = HashSet::new();
    let mut seen = HashSet::new();
    loop {
        let batch = queue.receive().await.context("Failed to read pending queue")?;
        let fresh: Vec<QueueMessage> = batch
            .into_iter()
            .filter(|msg| seen.insert(msg.body.clone()))
            .collect();
        if fresh.is_empty() {
            break;
        }
        for msg in fresh {
            match serde_json::from_str::<ClaimedLink>(&msg.body) {
                Ok(claim) => {
                    links.insert(claim.match_link);
                }
                Err(e) => warn!("Unreadable queue message {}: {}", msg.receipt, e),
            }
        }
    }
    debug!("{} links in flight", links.len());
    Ok(links)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
