//! Alert dispatch: payload shape, the sink trait, and the fan-out.
//!
//! Delivery is fan-out, not a pipeline: each sink's failure is logged on its
//! own and never blocks or fails delivery to the others. No sink-level
//! retries; the dedup layer upstream already guarantees at most one alert
//! per distinct condition, so a lost delivery stays lost.

pub mod slack;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::cluster::WarningEvent;
use crate::snapshot::OwnerRef;

/// Errors local to one sink's delivery attempt.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink not configured: {0}")]
    NotConfigured(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {0}")]
    Status(u16),
}

/// Normalized alert for one confirmed new condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
    /// Empty for pod-level alerts.
    #[serde(default)]
    pub container: String,
    pub reason: String,
    pub message: String,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub events: Vec<WarningEvent>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    pub timestamp: DateTime<Utc>,
}

impl AlertPayload {
    /// Short human headline for plain-text renderings.
    #[must_use]
    pub fn title(&self) -> String {
        if self.container.is_empty() {
            format!("Pod {}/{}: {}", self.namespace, self.pod, self.reason)
        } else {
            format!(
                "Container {} in {}/{}: {}",
                self.container, self.namespace, self.pod, self.reason
            )
        }
    }
}

/// One notification destination.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the sink has enough configuration to deliver.
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), SinkError>;

    /// Non-structured announcement (startup banner, node state).
    async fn send_text(&self, text: &str) -> Result<(), SinkError>;
}

/// Fans one alert out to every enabled sink.
pub struct Dispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
    timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver to every sink, collecting per-sink outcomes. A sink that
    /// exceeds the per-sink timeout counts as failed without delaying the
    /// rest beyond its own deadline.
    pub async fn dispatch(&self, alert: &AlertPayload) -> Vec<(&'static str, Result<(), SinkError>)> {
        let mut results = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            if !sink.enabled() {
                debug!(sink = sink.name(), "Sink disabled, skipping");
                continue;
            }
            let outcome = match tokio::time::timeout(self.timeout, sink.send(alert)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout(self.timeout)),
            };
            if let Err(e) = &outcome {
                error!(
                    sink = sink.name(),
                    namespace = %alert.namespace,
                    pod = %alert.pod,
                    error = %e,
                    "Alert delivery failed"
                );
            } else {
                debug!(sink = sink.name(), pod = %alert.pod, "Alert delivered");
            }
            results.push((sink.name(), outcome));
        }
        results
    }

    /// Deliver a plain text message to every sink.
    pub async fn dispatch_plain_message(&self, text: &str) {
        for sink in &self.sinks {
            if !sink.enabled() {
                continue;
            }
            let outcome = match tokio::time::timeout(self.timeout, sink.send_text(text)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout(self.timeout)),
            };
            if let Err(e) = outcome {
                error!(sink = sink.name(), error = %e, "Message delivery failed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! A recording sink shared by dispatcher and controller tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingSink {
        pub alerts: Mutex<Vec<AlertPayload>>,
        pub texts: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, alert: &AlertPayload) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Status(500));
            }
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }

        async fn send_text(&self, text: &str) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Status(500));
            }
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}
