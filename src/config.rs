//! Runtime configuration for the watcher.
//!
//! Loaded from a mounted YAML file with serde defaults so a missing or
//! partial file still yields a runnable configuration. `validate()` surfaces
//! contradictions (allow and deny lists both set for the same dimension)
//! once at startup instead of resolving them silently.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Cluster name included in alert payloads
    #[serde(default = "default_cluster_name", rename = "clusterName")]
    pub cluster_name: String,

    /// Namespace allow/deny policy
    #[serde(default)]
    pub namespaces: ListPolicy,

    /// Failure-reason allow/deny policy
    #[serde(default)]
    pub reasons: ListPolicy,

    /// Container names that never produce alerts
    #[serde(default, rename = "ignoredContainers")]
    pub ignored_containers: Vec<String>,

    /// Treat containers killed by a graceful stop ("Killing" event) as benign
    #[serde(default, rename = "ignoreFailedGracefulShutdown")]
    pub ignore_failed_graceful_shutdown: bool,

    /// Bounded tail of container logs attached to alerts
    #[serde(default = "default_max_log_lines", rename = "maxLogLines")]
    pub max_log_lines: i64,

    /// Parallel workers draining the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Retry/backoff policy for failed evaluation passes
    #[serde(default)]
    pub retry: RetryConfig,

    /// Deadline for a single lookup collaborator call (seconds)
    #[serde(default = "default_lookup_timeout", rename = "lookupTimeoutSecs")]
    pub lookup_timeout_secs: u64,

    /// Deadline for delivery to a single alert sink (seconds)
    #[serde(default = "default_sink_timeout", rename = "sinkTimeoutSecs")]
    pub sink_timeout_secs: u64,

    /// Alert sink endpoints
    #[serde(default)]
    pub sinks: SinkConfig,
}

/// Allow/deny list pair for one dimension (namespaces, reasons).
///
/// The two lists are mutually exclusive configuration. When both are
/// non-empty `validate` reports the contradiction; if a caller runs anyway
/// the deny list wins (implementation-defined, treated as a caller bug).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListPolicy {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ListPolicy {
    /// True when the policy excludes the given value.
    #[must_use]
    pub fn excludes(&self, value: &str) -> bool {
        if !self.deny.is_empty() {
            return self.deny.iter().any(|v| v == value);
        }
        if !self.allow.is_empty() {
            return !self.allow.iter().any(|v| v == value);
        }
        false
    }

    fn validate(&self, dimension: &str) -> Result<()> {
        if !self.allow.is_empty() && !self.deny.is_empty() {
            return Err(Error::Config(format!(
                "{dimension}: allow and deny lists are mutually exclusive but both are set"
            )));
        }
        Ok(())
    }
}

/// Retry policy consumed by the work queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts before a key is abandoned
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_base_delay_ms", rename = "baseDelayMs")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_delay_ms", rename = "maxDelayMs")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Webhook endpoints for alert delivery.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Generic JSON webhook endpoint
    #[serde(default, rename = "webhookUrl")]
    pub webhook_url: Option<String>,

    /// Slack incoming-webhook endpoint
    #[serde(default, rename = "slackWebhookUrl")]
    pub slack_webhook_url: Option<String>,
}

fn default_cluster_name() -> String {
    "default".to_string()
}

fn default_max_log_lines() -> i64 {
    50
}

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_sink_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from a mounted YAML file, falling back to defaults
    /// when the file is missing.
    pub fn from_mounted_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default_with_serde());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Defaults as serde would produce them from an empty document.
    #[must_use]
    pub fn default_with_serde() -> Self {
        serde_yaml::from_str("{}").unwrap_or_default()
    }

    /// Validate the loaded configuration. Contradictions are reported, not
    /// silently resolved.
    pub fn validate(&self) -> Result<()> {
        self.namespaces.validate("namespaces")?;
        self.reasons.validate("reasons")?;
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    #[must_use]
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs)
    }
}
