//! DuckDB-backed object store and queue, for local runs and tests.

use crate::config::QueueConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use duckdb::{Connection, OptionalExt, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use super::{MessageQueue, ObjectStore, QueueMessage};

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    bucket      VARCHAR   NOT NULL,
    key         VARCHAR   NOT NULL,
    body        BLOB      NOT NULL,
    updated_at  TIMESTAMP NOT NULL,
    PRIMARY KEY (bucket, key)
);

CREATE SEQUENCE IF NOT EXISTS queue_message_ids START 1;

CREATE TABLE IF NOT EXISTS queue_messages (
    id          BIGINT    PRIMARY KEY DEFAULT nextval('queue_message_ids'),
    body        VARCHAR   NOT NULL,
    enqueued_at TIMESTAMP NOT NULL,
    -- hidden from receive() until this time
    visible_at  TIMESTAMP NOT NULL
);
"#;

// ── Store ─────────────────────────────────────────────────────────────────────

pub struct LocalStore {
    conn: Mutex<Connection>,
    queue: QueueConfig,
}

impl LocalStore {
    pub fn open(path: &Path, queue: QueueConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self {
            conn: Mutex::new(conn),
            queue,
        })
    }

    pub fn open_in_memory(queue: QueueConfig) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            queue,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("local store connection poisoned"))
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running local store migrations…");
        self.conn()?.execute_batch(DDL).context("DDL failed")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn object_count(&self, bucket: &str) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM objects WHERE bucket = ?")?;
        Ok(s.query_row(params![bucket], |r| r.get(0))?)
    }

    /// Messages on the queue, visible or not.
    #[cfg(test)]
    pub fn queue_len(&self) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM queue_messages")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM objects WHERE bucket = ? AND key = ?")?;
        let body: Option<Vec<u8>> = stmt
            .query_row(params![bucket, key], |r| r.get(0))
            .optional()
            .with_context(|| format!("get {}/{}", bucket, key))?;
        Ok(body)
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.conn()?
            .execute(
                r#"INSERT INTO objects (bucket, key, body, updated_at)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT (bucket, key) DO UPDATE SET
                       body       = excluded.body,
                       updated_at = excluded.updated_at"#,
                params![bucket, key, body, Utc::now().naive_utc()],
            )
            .with_context(|| format!("put {}/{}", bucket, key))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM objects WHERE bucket = ? AND starts_with(key, ?) ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![bucket, prefix], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[async_trait]
impl MessageQueue for LocalStore {
    async fn send(&self, body: &str) -> Result<String> {
        let now = Utc::now().naive_utc();
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            r#"INSERT INTO queue_messages (body, enqueued_at, visible_at)
               VALUES (?, ?, ?) RETURNING id"#,
            params![body, now, now],
            |r| r.get(0),
        )?;
        Ok(id.to_string())
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let now = Utc::now().naive_utc();
        let hidden_until = now + Duration::seconds(self.queue.visibility_timeout_secs);
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let batch: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, body FROM queue_messages WHERE visible_at <= ? ORDER BY id LIMIT ?",
            )?;
            stmt.query_map(params![now, self.queue.max_messages as i64], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })?
            .collect::<Result<_, _>>()?
        };

        for (id, _) in &batch {
            tx.execute(
                "UPDATE queue_messages SET visible_at = ? WHERE id = ?",
                params![hidden_until, id],
            )?;
        }
        tx.commit()?;

        Ok(batch
            .into_iter()
            .map(|(id, body)| QueueMessage {
                receipt: id.to_string(),
                body,
            })
            .collect())
    }

    async fn delete(&self, receipt: &str) -> Result<()> {
        let id: i64 = receipt
            .parse()
            .with_context(|| format!("bad receipt {}", receipt))?;
        self.conn()?
            .execute("DELETE FROM queue_messages WHERE id = ?", params![id])?;
        Ok(())
    }
}
