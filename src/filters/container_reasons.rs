//! Derives the final condition for the container and decides whether it is
//! new enough to alert on.
//!
//! A container sitting in CrashLoopBackOff carries no useful diagnostics in
//! its current state; the previous terminated state does. The override
//! triggers on `reason == "CrashLoopBackOff" || has_restarts`, and a stale
//! restart flag can mask a genuinely new terminated reason. The behavior is
//! kept literally; the test below pins it as a known edge case.

use async_trait::async_trait;
use tracing::debug;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;

pub struct ContainerReasonsFilter;

#[async_trait]
impl Filter for ContainerReasonsFilter {
    fn name(&self) -> &'static str {
        "container-reasons"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        if ctx.container.reason == "CrashLoopBackOff" || ctx.container.has_restarts {
            if let Some(last) = ctx.container.snapshot.last_terminated.clone() {
                ctx.container.reason = last.reason;
                ctx.container.message = last.message;
                ctx.container.exit_code = last.exit_code;
                ctx.container.last_terminated_on = last.started_at;
            }
        }

        if ctx.config.reasons.excludes(&ctx.container.reason) {
            return Ok(true);
        }

        let fresh = ctx.container.to_record();
        let stored = ctx
            .store
            .get(&ctx.pod.namespace, &ctx.pod.name, &ctx.container.name);
        if let Some(stored) = stored {
            if stored.same_alert_identity(&fresh) {
                debug!(
                    namespace = %ctx.pod.namespace,
                    pod = %ctx.pod.name,
                    container = %ctx.container.name,
                    reason = %fresh.reason,
                    "Condition unchanged, suppressing"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}
