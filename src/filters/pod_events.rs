//! Suppresses pod-level issues on pods that are being torn down: a Warning
//! event mentioning "deleting pod" means the pod is going away, not crashing.

use async_trait::async_trait;

use super::Filter;
use crate::context::{EvaluationContext, PodIssueKind};
use crate::error::Result;

pub struct PodEventsFilter;

#[async_trait]
impl Filter for PodEventsFilter {
    fn name(&self) -> &'static str {
        "pod-events"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        if ctx.issue != PodIssueKind::PodLevel {
            return Ok(false);
        }
        let being_deleted = ctx.events().await?.iter().any(|e| {
            e.type_ == "Warning" && e.message.contains("deleting pod")
        });
        if being_deleted {
            ctx.issue = PodIssueKind::None;
            return Ok(true);
        }
        Ok(false)
    }
}
