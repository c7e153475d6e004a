//! Threshold-gated cache maintenance.
//!
//! The maintenance pass runs at most once per eligibility window: a
//! persisted due timestamp records the earliest allowed next run, and only a
//! *successful* pass advances it. A failed pass leaves the timestamp
//! untouched, so the next process start (or the next eligibility check)
//! retries until it succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Task, TaskContext, TaskResult};

/// Settings key holding the maintenance due timestamp (epoch seconds).
pub const MAINTENANCE_DUE_KEY: &str = "maintenance.due";

/// Performs the actual cache compaction/cleanup.
///
/// Must be idempotent on retry; the task may invoke it again after a failure
/// or a crash before the due timestamp was advanced.
#[async_trait]
pub trait MaintenanceService: Send + Sync {
    async fn run(&self, now: i64) -> TaskResult;
}

/// Runs the maintenance collaborator once the persisted due timestamp has
/// passed, then pushes the timestamp one interval into the future.
pub struct MaintenanceTask {
    service: Arc<dyn MaintenanceService>,
    /// How far the due timestamp advances after a successful pass
    interval: Duration,
    /// Wait before starting, to stay clear of process-start contention
    grace_delay: Duration,
}

impl MaintenanceTask {
    pub fn new(service: Arc<dyn MaintenanceService>, interval: Duration, grace_delay: Duration) -> Self {
        Self {
            service,
            interval,
            grace_delay,
        }
    }
}

#[async_trait]
impl Task for MaintenanceTask {
    fn name(&self) -> &'static str {
        "cache_maintenance"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let now = Utc::now().timestamp();
        let due = ctx.settings.due_timestamp(MAINTENANCE_DUE_KEY);

        if now < due {
            tracing::debug!(task = %ctx.task_name, due, now, "Maintenance not yet due");
            return Ok(());
        }

        if ctx.signal.wait_for_abort(self.grace_delay).await {
            return Ok(());
        }

        ctx.log_info("Maintenance starting");
        self.service.run(now).await?;

        // Advance strictly after success so a failure or crash retries.
        let next = now + self.interval.as_secs() as i64;
        ctx.settings.set_due_timestamp(MAINTENANCE_DUE_KEY, next)?;
        ctx.log_info("Maintenance finished");
        Ok(())
    }
}
