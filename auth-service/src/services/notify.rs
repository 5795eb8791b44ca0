//! Notification sink client.
//!
//! Best-effort hand-off to the notification service; failures are logged by
//! the background queue and never surfaced to the primary flow.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::services::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create_notification(&self, notification: NewNotification)
        -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct HttpNotificationClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        tracing::info!(endpoint = %base_url, "Notification client configured");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationClient {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/internal/notifications", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&notification)
            .send()
            .await
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("Notification service error: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Notification service returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
