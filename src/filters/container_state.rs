//! Coarse state classification and the first layer of noise suppression:
//! healthy running containers, containers still starting up, and clean
//! terminations never alert.

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::snapshot::ContainerState;
use crate::store::StatusLabel;

/// Waiting reasons that are part of normal startup.
const BENIGN_WAITING_REASONS: &[&str] = &["ContainerCreating", "PodInitializing"];

/// Exit codes of a clean stop: 0 is an intentional exit, 143 is a graceful
/// SIGTERM shutdown.
const BENIGN_EXIT_CODES: &[i32] = &[0, 143];

pub struct ContainerStateFilter;

#[async_trait]
impl Filter for ContainerStateFilter {
    fn name(&self) -> &'static str {
        "container-state"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        match ctx.container.snapshot.state.clone() {
            ContainerState::Running => {
                ctx.container.status = StatusLabel::Running;
                if !ctx.container.has_restarts {
                    // Healthy again; the wrapper drops the stored record.
                    ctx.container.recovered = true;
                    return Ok(true);
                }
                Ok(false)
            }
            ContainerState::Waiting { reason, message } => {
                ctx.container.status = StatusLabel::Waiting;
                ctx.container.reason = reason.clone();
                ctx.container.message = message;
                Ok(BENIGN_WAITING_REASONS.contains(&reason.as_str()))
            }
            ContainerState::Terminated(t) => {
                ctx.container.status = StatusLabel::Terminated;
                ctx.container.reason = t.reason.clone();
                ctx.container.message = t.message;
                ctx.container.exit_code = t.exit_code;
                ctx.container.last_terminated_on = t.started_at;
                Ok(t.reason == "Completed" || BENIGN_EXIT_CODES.contains(&t.exit_code))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{
        context_for, pod, running_container, scope_container, terminated_container,
        waiting_container, FakeLookup,
    };
    use super::*;

    #[tokio::test]
    async fn running_without_restarts_recovers() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &running_container("app", 0));
        assert!(ContainerStateFilter.execute(&mut ctx).await.unwrap());
        assert!(ctx.container.recovered);
        assert_eq!(ctx.container.status, StatusLabel::Running);
    }

    #[tokio::test]
    async fn running_with_fresh_restart_continues() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &running_container("app", 1));
        ctx.container.has_restarts = true;
        assert!(!ContainerStateFilter.execute(&mut ctx).await.unwrap());
        assert!(!ctx.container.recovered);
    }

    #[tokio::test]
    async fn container_creating_is_benign() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &waiting_container("app", "ContainerCreating", 0));
        assert!(ContainerStateFilter.execute(&mut ctx).await.unwrap());
    }

    #[tokio::test]
    async fn pod_initializing_is_benign() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &waiting_container("app", "PodInitializing", 0));
        assert!(ContainerStateFilter.execute(&mut ctx).await.unwrap());
    }

    #[tokio::test]
    async fn crash_loop_waiting_continues() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &waiting_container("app", "CrashLoopBackOff", 3));
        assert!(!ContainerStateFilter.execute(&mut ctx).await.unwrap());
        assert_eq!(ctx.container.reason, "CrashLoopBackOff");
        assert_eq!(ctx.container.status, StatusLabel::Waiting);
    }

    #[tokio::test]
    async fn clean_exit_codes_never_alert() {
        for exit_code in [0, 143] {
            let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
            scope_container(&mut ctx, &terminated_container("app", "Error", exit_code, 0));
            assert!(
                ContainerStateFilter.execute(&mut ctx).await.unwrap(),
                "exit code {exit_code} must not alert"
            );
        }
    }

    #[tokio::test]
    async fn completed_reason_never_alerts() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &terminated_container("app", "Completed", 1, 0));
        assert!(ContainerStateFilter.execute(&mut ctx).await.unwrap());
    }

    #[tokio::test]
    async fn real_failure_continues_with_details() {
        let mut ctx = context_for(pod("ns", "app"), FakeLookup::default());
        scope_container(&mut ctx, &terminated_container("app", "OOMKilled", 137, 0));
        assert!(!ContainerStateFilter.execute(&mut ctx).await.unwrap());
        assert_eq!(ctx.container.reason, "OOMKilled");
        assert_eq!(ctx.container.exit_code, 137);
        assert_eq!(ctx.container.status, StatusLabel::Terminated);
    }
}
