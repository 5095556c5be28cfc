//! Generic JSON webhook sink: POSTs the payload as-is.

use async_trait::async_trait;
use tracing::debug;

use super::{AlertPayload, AlertSink, SinkError};

/// Environment variable consulted when the config file has no URL.
const ENV_WEBHOOK_URL: &str = "PODWATCH_WEBHOOK_URL";

pub struct WebhookSink {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookSink {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url: Some(url),
            client: reqwest::Client::new(),
        }
    }

    /// Configured URL, falling back to the environment.
    #[must_use]
    pub fn from_config(url: Option<&String>) -> Self {
        let url = url
            .cloned()
            .or_else(|| std::env::var(ENV_WEBHOOK_URL).ok());
        if url.is_none() {
            debug!("Webhook sink disabled ({ENV_WEBHOOK_URL} not set)");
        }
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, body: &serde_json::Value) -> Result<(), SinkError> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| SinkError::NotConfigured("webhook".to_string()))?;
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), SinkError> {
        self.post(&serde_json::to_value(alert)?).await
    }

    async fn send_text(&self, text: &str) -> Result<(), SinkError> {
        self.post(&serde_json::json!({ "text": text })).await
    }
}
