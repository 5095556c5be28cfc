//! Resolves and caches the owning controller for the alert payload.
//! Never stops the chain.

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;

pub struct PodOwnersFilter;

#[async_trait]
impl Filter for PodOwnersFilter {
    fn name(&self) -> &'static str {
        "pod-owners"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        ctx.owner().await;
        Ok(false)
    }
}
