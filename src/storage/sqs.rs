use crate::config::QueueConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client;
use tracing::{debug, warn};

use super::{MessageQueue, QueueMessage};

pub struct SqsQueue {
    client: Client,
    url: String,
    max_messages: i32,
    wait_time_secs: i32,
}

impl SqsQueue {
    pub fn new(sdk: &SdkConfig, url: String, config: &QueueConfig) -> Self {
        Self {
            client: Client::new(sdk),
            url,
            // SQS accepts 1..=10 per receive
            max_messages: config.max_messages.clamp(1, 10),
            wait_time_secs: config.wait_time_secs.clamp(0, 20),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<String> {
        let out = self
            .client
            .send_message()
            .queue_url(&self.url)
            .message_body(body)
            .send()
            .await
            .with_context(|| format!("SendMessage to {}", self.url))?;
        Ok(out.message_id().unwrap_or_default().to_string())
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let out = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_time_secs)
            .send()
            .await
            .with_context(|| format!("ReceiveMessage from {}", self.url))?;

        let mut batch = Vec::new();
        for m in out.messages() {
            match (m.receipt_handle(), m.body()) {
                (Some(receipt), Some(body)) => batch.push(QueueMessage {
                    receipt: receipt.to_string(),
                    body: body.to_string(),
                }),
                _ => warn!("Skipping SQS message without body: {:?}", m.message_id()),
            }
        }
        debug!("Received {} messages", batch.len());
        Ok(batch)
    }

    async fn delete(&self, receipt: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt)
            .send()
            .await
            .with_context(|| format!("DeleteMessage on {}", self.url))?;
        Ok(())
    }
}
