//! podwatch core library.
//!
//! Watches pod and node lifecycle state and decides, for each observed
//! change, whether a human-actionable alert should be produced. The heart of
//! the crate is the ordered filter chain plus the dedup store: together they
//! emit at most one alert per distinct failure condition and stay silent on
//! duplicates, transient startup states, and orchestrated shutdowns.

pub mod cluster;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod queue;
pub mod snapshot;
pub mod store;

// Re-export the types the binary and embedders actually touch
pub use cluster::{ClusterLookup, KubeCluster};
pub use config::Config;
pub use controller::Controller;
pub use dispatch::{AlertPayload, AlertSink, Dispatcher};
pub use error::{Error, Result};
pub use snapshot::{NodeSnapshot, PodSnapshot};
pub use store::DedupStore;
