use crate::config::StorageConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig, meta::region::RegionProviderChain};
use aws_sdk_s3::{Client, config::Region, primitives::ByteStream};
use tracing::{debug, info};

use super::ObjectStore;

const FALLBACK_REGION: &str = "eu-west-1";

/// Shared AWS config for the S3 and SQS clients. An `endpoint_url` points both
/// at an emulator.
pub async fn load_sdk_config(config: &StorageConfig) -> SdkConfig {
    let region = RegionProviderChain::first_try(config.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(FALLBACK_REGION);
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(sdk: &SdkConfig, config: &StorageConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk);
        if config.endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }
        info!(region = ?sdk.region(), "S3 client configured");
        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        debug!("s3 get {}/{}", bucket, key);
        let out = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(out) => out,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(err).with_context(|| format!("GetObject {}/{}", bucket, key));
            }
        };
        let data = out
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read s3://{}/{}", bucket, key))?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        debug!("s3 put {}/{} ({} bytes)", bucket, key, body.len());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("PutObject {}/{}", bucket, key))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("ListObjectsV2 {}/{}", bucket, prefix))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key()).map(str::to_string));
        }
        Ok(keys)
    }
}
