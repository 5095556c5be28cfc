//! Pod classification from the condition list: no-issue, pod-level issue,
//! or container-level issue.

use async_trait::async_trait;
use tracing::debug;

use super::Filter;
use crate::context::{EvaluationContext, PodIssueKind};
use crate::error::Result;
use crate::snapshot::PodEventKind;
use crate::store::POD_LEVEL_KEY;

pub struct PodStatusFilter;

#[async_trait]
impl Filter for PodStatusFilter {
    fn name(&self) -> &'static str {
        "pod-status"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        // A finished pod never alerts; a brand-new pod with no conditions
        // yet hasn't had a chance to fail.
        if ctx.pod.phase == "Succeeded" {
            return Ok(true);
        }
        if ctx.pod.conditions.is_empty() && ctx.event == PodEventKind::Added {
            return Ok(true);
        }

        if let Some(ready) = ctx.pod.condition("Ready") {
            if ready.status == "False" && ready.reason == "PodCompleted" {
                return Ok(true);
            }
        }

        if let Some(scheduled) = ctx.pod.condition("PodScheduled") {
            if scheduled.status == "False" {
                ctx.issue = PodIssueKind::PodLevel;
                ctx.pod_reason = scheduled.reason.clone();
                ctx.pod_message = scheduled.message.clone();
                // Already reported: the pod-level sentinel record exists.
                if ctx
                    .store
                    .get(&ctx.pod.namespace, &ctx.pod.name, POD_LEVEL_KEY)
                    .is_some()
                {
                    debug!(
                        namespace = %ctx.pod.namespace,
                        pod = %ctx.pod.name,
                        "Pod-level issue already reported"
                    );
                    return Ok(true);
                }
                return Ok(false);
            }
        }

        if let Some(containers_ready) = ctx.pod.condition("ContainersReady") {
            if containers_ready.status == "False" {
                ctx.issue = PodIssueKind::ContainerLevel;
                return Ok(false);
            }
        }

        Ok(true)
    }
}
