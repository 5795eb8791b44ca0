//! SMS delivery via an external HTTP gateway.
//!
//! Delivery itself is an external collaborator; this client only hands the
//! message over. Callers treat SMS as fire-and-forget and submit sends to
//! the background queue.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::services::ServiceError;

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, destination: &str, body: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
}

impl HttpSmsGateway {
    pub fn new(config: &crate::config::SmsConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        tracing::info!(gateway = %config.gateway_url, "SMS gateway client initialized");

        Ok(Self {
            client,
            gateway_url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SmsProvider for HttpSmsGateway {
    async fn send_sms(&self, destination: &str, body: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "to": destination, "body": body }))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("SMS gateway error: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "SMS gateway returned {}",
                response.status()
            )));
        }

        tracing::info!(to = %destination, "SMS dispatched");
        Ok(())
    }
}
