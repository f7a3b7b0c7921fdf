//! Filters used by the demo commands.

use std::time::Instant;

use async_trait::async_trait;
use switchyard_engine::{CancellationToken, Filter, InvocationContext, Next, OperationCancelled};
use tracing::{debug, info, warn};

/// Global filter: one tracing span-like pair of events around every command.
#[derive(Debug, Default)]
pub struct TracingFilter;

#[async_trait]
impl Filter for TracingFilter {
    async fn invoke(
        &self,
        ctx: InvocationContext,
        token: CancellationToken,
        next: Next,
    ) -> anyhow::Result<()> {
        let command = ctx.command_name().to_string();
        let start = Instant::now();
        debug!(command = %command, args = ?ctx.arguments(), "Command starting");

        let result = next.run(ctx, token).await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(()) => debug!(
                command = %command,
                duration_ms = %format!("{duration_ms:.2}"),
                "Command completed"
            ),
            Err(e) if is_cancellation(e) => info!(
                command = %command,
                duration_ms = %format!("{duration_ms:.2}"),
                "Command cancelled"
            ),
            Err(e) => warn!(
                command = %command,
                duration_ms = %format!("{duration_ms:.2}"),
                error = %e,
                "Command failed"
            ),
        }
        result
    }
}

/// Whether the command stopped because cancellation was requested.
fn is_cancellation(error: &anyhow::Error) -> bool {
    error.downcast_ref::<OperationCancelled>().is_some()
}

/// Per-command filter recording who ran what.
#[derive(Debug, Default)]
pub struct AuditFilter;

/// Attached to the context by [`AuditFilter`]; readable by the command body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub command: String,
    pub user: String,
}

#[async_trait]
impl Filter for AuditFilter {
    async fn invoke(
        &self,
        ctx: InvocationContext,
        token: CancellationToken,
        next: Next,
    ) -> anyhow::Result<()> {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let record = AuditRecord {
            command: ctx.command_name().to_string(),
            user,
        };
        info!(command = %record.command, user = %record.user, "Audit");

        next.run(ctx.with_state(record), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_not_a_failure() {
        assert!(is_cancellation(&OperationCancelled.into()));
        assert!(is_cancellation(
            &anyhow::Error::from(OperationCancelled).context("while waiting")
        ));
        assert!(!is_cancellation(&anyhow::anyhow!("disk full")));
    }
}
