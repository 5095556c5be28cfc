//! Ordered, short-circuiting filter chains.
//!
//! Two fixed pipelines share one small capability: a filter inspects the
//! mutable [`EvaluationContext`] and answers "stop further processing".
//! The pod-level chain decides whether the pod is worth looking at; the
//! container-level chain runs once per container status entry and derives
//! the condition that may become an alert. Whichever unit stops first
//! prevents everything downstream in that chain from executing.

pub mod container_killing;
pub mod container_logs;
pub mod container_name;
pub mod container_reasons;
pub mod container_restarts;
pub mod container_state;
pub mod namespace;
pub mod pod_events;
pub mod pod_owners;
pub mod pod_status;

use async_trait::async_trait;
use tracing::debug;

use crate::context::EvaluationContext;
use crate::error::Result;

/// One unit of a filter chain.
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect and mutate the context; `Ok(true)` stops the chain.
    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool>;
}

/// Fixed ordered sequence of filters, iterated with early exit.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Pod-level chain: namespace policy, status classification, teardown
    /// event suppression.
    #[must_use]
    pub fn pod_chain() -> Self {
        Self {
            filters: vec![
                Box::new(namespace::NamespaceFilter),
                Box::new(pod_status::PodStatusFilter),
                Box::new(pod_events::PodEventsFilter),
            ],
        }
    }

    /// Container-level chain, executed once per container status entry.
    #[must_use]
    pub fn container_chain() -> Self {
        Self {
            filters: vec![
                Box::new(container_name::ContainerNameFilter),
                Box::new(container_restarts::ContainerRestartsFilter),
                Box::new(container_state::ContainerStateFilter),
                Box::new(container_killing::ContainerKillingFilter),
                Box::new(container_reasons::ContainerReasonsFilter),
                Box::new(container_logs::ContainerLogsFilter),
                Box::new(pod_owners::PodOwnersFilter),
            ],
        }
    }

    /// Run the chain; returns `true` when a unit short-circuited.
    pub async fn run(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        for filter in &self.filters {
            if filter.execute(ctx).await? {
                debug!(
                    filter = filter.name(),
                    namespace = %ctx.pod.namespace,
                    pod = %ctx.pod.name,
                    "Filter chain stopped"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}
