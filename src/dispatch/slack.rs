//! Slack incoming-webhook sink: renders the alert as a colored attachment.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{AlertPayload, AlertSink, SinkError};

const ENV_SLACK_WEBHOOK_URL: &str = "PODWATCH_SLACK_WEBHOOK_URL";

const COLOR_ALERT: &str = "#e74c3c";

pub struct SlackSink {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SlackAttachment>,
}

#[derive(Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    title: String,
    text: String,
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackSink {
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url: Some(webhook_url),
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn from_config(url: Option<&String>) -> Self {
        let webhook_url = url
            .cloned()
            .or_else(|| std::env::var(ENV_SLACK_WEBHOOK_URL).ok());
        if webhook_url.is_none() {
            debug!("Slack sink disabled ({ENV_SLACK_WEBHOOK_URL} not set)");
        }
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_payload(alert: &AlertPayload) -> SlackPayload {
        let mut fields = vec![
            field("Cluster", &alert.cluster),
            field("Namespace", &alert.namespace),
            field("Pod", &alert.pod),
            field("Reason", &alert.reason),
        ];
        if !alert.container.is_empty() {
            fields.push(field("Container", &alert.container));
        }
        if let Some(owner) = &alert.owner {
            fields.push(field("Owner", &format!("{} {}", owner.kind, owner.name)));
        }

        let mut text = alert.message.clone();
        if !alert.logs.is_empty() {
            text.push_str(&format!("\n```{}```", alert.logs));
        }
        if !alert.events.is_empty() {
            let excerpt: Vec<String> = alert
                .events
                .iter()
                .take(5)
                .map(|e| format!("[{}] {}: {}", e.type_, e.reason, e.message))
                .collect();
            text.push_str(&format!("\n*Events*\n{}", excerpt.join("\n")));
        }

        SlackPayload {
            text: None,
            attachments: vec![SlackAttachment {
                fallback: alert.title(),
                color: COLOR_ALERT.to_string(),
                title: alert.title(),
                text,
                fields,
                ts: Some(alert.timestamp.timestamp()),
            }],
        }
    }

    async fn post(&self, payload: &SlackPayload) -> Result<(), SinkError> {
        let url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| SinkError::NotConfigured("slack".to_string()))?;
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

fn field(title: &str, value: &str) -> SlackField {
    SlackField {
        title: title.to_string(),
        value: value.to_string(),
        short: true,
    }
}

#[async_trait]
impl AlertSink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), SinkError> {
        self.post(&Self::format_payload(alert)).await
    }

    async fn send_text(&self, text: &str) -> Result<(), SinkError> {
        self.post(&SlackPayload {
            text: Some(text.to_string()),
            attachments: vec![],
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::OwnerRef;
    use chrono::Utc;

    #[test]
    fn attachment_carries_owner_and_log_excerpt() {
        let alert = AlertPayload {
            cluster: "prod".to_string(),
            namespace: "ns".to_string(),
            pod: "app-abc".to_string(),
            container: "app".to_string(),
            reason: "Error".to_string(),
            message: "panic: boom".to_string(),
            logs: "stack trace".to_string(),
            events: vec![],
            owner: Some(OwnerRef {
                kind: "Deployment".to_string(),
                name: "app".to_string(),
            }),
            timestamp: Utc::now(),
        };
        let payload = SlackSink::format_payload(&alert);
        let attachment = &payload.attachments[0];
        assert!(attachment.text.contains("stack trace"));
        assert!(attachment
            .fields
            .iter()
            .any(|f| f.title == "Owner" && f.value == "Deployment app"));
    }
}
