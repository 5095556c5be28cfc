//! Namespace allow/deny policy. First unit of the pod chain: a stop here
//! happens before any condition is computed, so no dedup write follows.

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;

pub struct NamespaceFilter;

#[async_trait]
impl Filter for NamespaceFilter {
    fn name(&self) -> &'static str {
        "namespace"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        Ok(ctx.config.namespaces.excludes(&ctx.pod.namespace))
    }
}
