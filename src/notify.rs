//! Publishing notifications to the SNS topic that fans out to email subscribers

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_sns::config::Region;
use aws_sdk_sns::error::DisplayErrorContext;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::PublishError;

/// One outbound notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub subject: String,
    pub message: String,
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &NotificationMessage) -> Result<(), PublishError>;
}

/// Publishes through the AWS SDK. Transport retries are the SDK's own.
pub struct SnsPublisher {
    client: SnsClient,
    topic_arn: String,
}

impl SnsPublisher {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    /// Builds a client from the ambient AWS credential chain, optionally pinning the region.
    pub async fn from_env(topic_arn: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared_config = loader.load().await;
        Self::new(SnsClient::new(&shared_config), topic_arn)
    }
}

#[async_trait]
impl NotificationPublisher for SnsPublisher {
    #[instrument(skip(self, notification), fields(topic = %self.topic_arn))]
    async fn publish(&self, notification: &NotificationMessage) -> Result<(), PublishError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(&notification.subject)
            .message(&notification.message)
            .send()
            .await
            .map_err(|e| PublishError::Delivery {
                topic: self.topic_arn.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        info!(message_id = output.message_id().unwrap_or("-"), "Notification published");
        Ok(())
    }
}
