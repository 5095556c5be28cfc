//! Error types shared across the crate.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while watching, evaluating, or alerting on cluster state.
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API call failed (object fetch, event list, log fetch)
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A lookup collaborator call exceeded its deadline
    #[error("lookup timed out after {0:?}")]
    LookupTimeout(std::time::Duration),

    /// Configuration contradiction or invalid value
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key exhausted its retry budget and was dropped from the queue
    #[error("retries exhausted for {key} after {attempts} attempts")]
    RetriesExhausted { key: String, attempts: u32 },
}

impl Error {
    /// Transient errors are retried through the work queue's backoff;
    /// everything else is surfaced once and dropped.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Kube(_) | Error::LookupTimeout(_))
    }
}
