//! Event-driven entry points. Each takes a JSON event in the shape the
//! notification source sends and returns a status plus a small JSON body.

use crate::pipeline::{LoadMode, Pipeline};
use anyhow::{Context, Result};
use clap::ValueEnum;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::info;

// ── Events ────────────────────────────────────────────────────────────────────

/// Object-created notification.
#[derive(Debug, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    /// URL-encoded, `+` for spaces.
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SqsRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SqsRecord {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduledEvent {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HandlerResponse {
    fn ok() -> Self {
        Self {
            status_code: 200,
            headers: None,
            body: None,
        }
    }

    fn bad_request(body: &Value) -> Self {
        Self {
            status_code: 400,
            ..Self::ok()
        }
        .with_body(body)
    }

    fn json(mut self) -> Self {
        self.headers = Some(BTreeMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]));
        self
    }

    fn with_body(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }
}

/// Object keys in notifications are form-encoded.
pub fn decode_key(raw: &str) -> Result<String> {
    let plus_decoded = raw.replace('+', " ");
    Ok(percent_decode_str(&plus_decoded)
        .decode_utf8()
        .with_context(|| format!("Object key is not UTF-8: {}", raw))?
        .into_owned())
}

fn s3_targets(event: Value) -> Result<Vec<(String, String)>> {
    let event: S3Event = serde_json::from_value(event).context("Not an S3 event")?;
    event
        .records
        .into_iter()
        .map(|r| Ok((r.s3.bucket.name, decode_key(&r.s3.object.key)?)))
        .collect()
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Handler {
    StandardiseXgResults,
    CleanFootballData,
    LineupsLoader,
    ScrapeXgResults,
    ScrapeCurrentSeason,
    ScrapeResults,
}

pub async fn invoke(pipeline: &Pipeline, handler: Handler, event: Value) -> Result<HandlerResponse> {
    info!("Invoking {:?}", handler);
    match handler {
        Handler::StandardiseXgResults => {
            let mut written = Vec::new();
            for (bucket, key) in s3_targets(event)? {
                written.push(pipeline.standardise_xg_results(&bucket, &key).await?);
            }
            Ok(HandlerResponse::ok().json().with_body(&json!({ "written": written })))
        }

        Handler::CleanFootballData => {
            let mut rows = 0usize;
            for (bucket, key) in s3_targets(event)? {
                rows += pipeline.clean_football_data(&bucket, &key).await?;
            }
            Ok(HandlerResponse::ok().json().with_body(&json!({ "rows": rows })))
        }

        Handler::LineupsLoader => {
            let event: SqsEvent = serde_json::from_value(event).context("Not an SQS event")?;
            let mut written = Vec::new();
            for record in &event.records {
                written.push(pipeline.load_lineup_message(&record.body).await?);
            }
            Ok(HandlerResponse::ok().json().with_body(&json!({ "written": written })))
        }

        Handler::ScrapeXgResults => {
            pipeline.scrape_xg_result_seasons().await?;
            Ok(HandlerResponse::ok().json().with_body(&json!({ "Version": app_version() })))
        }

        Handler::ScrapeCurrentSeason => {
            pipeline.scrape_current_seasons().await?;
            Ok(HandlerResponse::ok().json())
        }

        Handler::ScrapeResults => {
            let mode = serde_json::from_value::<ScheduledEvent>(event)
                .map_err(|e| format!("Invalid event: {}", e))
                .and_then(|event| {
                    event
                        .mode
                        .as_deref()
                        .unwrap_or("update")
                        .parse::<LoadMode>()
                });
            match mode {
                Ok(mode) => {
                    pipeline.load_football_data(mode).await?;
                    Ok(HandlerResponse::ok()
                        .with_body(&json!(format!("{} mode executed successfully", mode))))
                }
                Err(msg) => Ok(HandlerResponse::bad_request(&json!(msg))),
            }
        }
    }
}

fn app_version() -> String {
    std::env::var("APP_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
