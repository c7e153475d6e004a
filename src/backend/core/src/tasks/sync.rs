//! Recurring remote-account sync monitor.
//!
//! The monitor loops {gate -> run -> sleep} until shutdown. Each cycle it
//! waits out foreground activity, asks the sync collaborator for fresh
//! remote state, branches on the outcome for reporting, re-reads the
//! configured interval, and sleeps it off in pause-tick-sized slices so the
//! shutdown signal is observed within one tick.
//!
//! Sync outcomes never stop the loop; a failed attempt is simply reported
//! and retried on the next cycle. Only the shutdown signal terminates it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use super::{Task, TaskContext, TaskKind, TaskResult};
use crate::control::wait_while_paused;

/// Outcome of one remote sync attempt.
///
/// A closed set: the collaborator reports every condition here rather than
/// through errors, and the monitor matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Remote activity changed and local caches were updated.
    Success,
    /// Remote state is unchanged since the last attempt.
    NoChanges,
    /// No account is configured; nothing to sync against.
    NotConfigured,
    /// The attempt failed (network, auth, remote error). Recoverable.
    Failed,
}

/// Performs the actual remote synchronization.
///
/// Each call is independent; the monitor calls it once per cycle.
#[async_trait]
pub trait SyncService: Send + Sync {
    async fn sync(&self) -> SyncStatus;
}

/// Host-side view plumbing the monitor pokes after sync activity.
///
/// Both calls are bounded and must not block scheduling.
pub trait ViewRefresher: Send + Sync {
    /// Drop derived list caches so the next render rebuilds them.
    fn invalidate_lists(&self);

    /// Ask the host UI to redraw home-screen widgets.
    fn refresh_widgets(&self);
}

/// Long-lived polling task keeping local caches in step with the remote
/// watch-history account.
pub struct SyncMonitorTask {
    sync: Arc<dyn SyncService>,
    views: Arc<dyn ViewRefresher>,
    /// Poll granularity for pause gating and sleep slicing
    pause_tick: Duration,
    /// Pause after the one-time list invalidation, so the host finishes its
    /// own startup before caches rebuild
    settle_delay: Duration,
}

impl SyncMonitorTask {
    pub fn new(
        sync: Arc<dyn SyncService>,
        views: Arc<dyn ViewRefresher>,
        pause_tick: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            sync,
            views,
            pause_tick,
            settle_delay,
        }
    }

    /// Interruptible sleep, sliced into pause-tick-sized waits. Returns
    /// `true` if shutdown fired mid-sleep.
    async fn sleep_interruptibly(&self, ctx: &TaskContext, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            let slice = remaining.min(self.pause_tick);
            if ctx.signal.wait_for_abort(slice).await {
                return true;
            }
            remaining -= slice;
        }
        false
    }

    fn report(&self, ctx: &TaskContext, status: SyncStatus, next_mins: i64) {
        match status {
            SyncStatus::Success => {
                ctx.log_info("Sync performed, remote activity applied");
                counter!("steward_sync_runs", "outcome" => "success").increment(1);
                if ctx.settings.refresh_widgets() {
                    self.views.refresh_widgets();
                    ctx.log_info("Widget refresh performed");
                } else {
                    ctx.log_info("Widget refresh disabled, skipping");
                }
            }
            SyncStatus::NoChanges => {
                ctx.log_info(&format!(
                    "Up to date, no changes needed; next update in {next_mins} minutes"
                ));
                counter!("steward_sync_runs", "outcome" => "no_changes").increment(1);
            }
            SyncStatus::NotConfigured => {
                ctx.log_info(&format!(
                    "Skipped, no account configured; next update in {next_mins} minutes"
                ));
                counter!("steward_sync_runs", "outcome" => "not_configured").increment(1);
            }
            SyncStatus::Failed => {
                ctx.log_warn(&format!(
                    "Sync failed, will retry; next update in {next_mins} minutes"
                ));
                counter!("steward_sync_runs", "outcome" => "failed").increment(1);
            }
        }
    }
}

#[async_trait]
impl Task for SyncMonitorTask {
    fn name(&self) -> &'static str {
        "sync_monitor"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Recurring
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        // Per-process marker; a restart repeats the (idempotent) invalidation.
        let mut first_run_done = false;

        loop {
            if wait_while_paused(&ctx.pause, &ctx.signal, self.pause_tick).await {
                break;
            }

            if !first_run_done {
                self.views.invalidate_lists();
                first_run_done = true;
                if ctx.signal.wait_for_abort(self.settle_delay).await {
                    break;
                }
            }

            let status = self.sync.sync().await;

            // Re-read the interval after every attempt: the user may have
            // edited it while the attempt was in flight.
            let interval = ctx.settings.sync_interval();
            self.report(ctx, status, ctx.settings.sync_interval_mins());

            if self.sleep_interruptibly(ctx, interval).await {
                break;
            }
        }

        ctx.log_info("Sync monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingViews {
        invalidations: AtomicU32,
        refreshes: AtomicU32,
    }

    impl CountingViews {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                invalidations: AtomicU32::new(0),
                refreshes: AtomicU32::new(0),
            })
        }
    }

    impl ViewRefresher for CountingViews {
        fn invalidate_lists(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }

        fn refresh_widgets(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedSync(SyncStatus);

    #[async_trait]
    impl SyncService for FixedSync {
        async fn sync(&self) -> SyncStatus {
            self.0
        }
    }

    fn harness(
        status: SyncStatus,
        views: Arc<dyn ViewRefresher>,
    ) -> (
        crate::control::ShutdownController,
        TaskContext,
        SyncMonitorTask,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let controller = crate::control::ShutdownController::new();
        let ctx = TaskContext::new(
            "sync_monitor",
            controller.signal(),
            Arc::new(crate::control::PauseGate::new()),
            Arc::new(crate::settings::Settings::bootstrap(dir.path()).unwrap()),
        );
        let task = SyncMonitorTask::new(
            Arc::new(FixedSync(status)),
            views,
            Duration::from_secs(10),
            Duration::from_secs(5),
        );
        (controller, ctx, task, dir)
    }

    #[tokio::test(start_paused = true)]
    async fn test_widget_refresh_follows_setting() {
        let views = CountingViews::new();
        let (controller, ctx, task, _dir) = harness(SyncStatus::Success, views.clone());
        ctx.settings
            .set("sync.refresh_widgets", serde_json::Value::Bool(true))
            .unwrap();

        let runner = tokio::spawn(async move { task.run(&ctx).await });
        // Let the first cycle (settle + sync) complete, then stop.
        tokio::time::sleep(Duration::from_secs(8)).await;
        controller.shutdown();
        runner.await.unwrap().unwrap();

        assert_eq!(views.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_widget_refresh_skipped_when_disabled() {
        let views = CountingViews::new();
        let (controller, ctx, task, _dir) = harness(SyncStatus::Success, views.clone());

        let runner = tokio::spawn(async move { task.run(&ctx).await });
        tokio::time::sleep(Duration::from_secs(8)).await;
        controller.shutdown();
        runner.await.unwrap().unwrap();

        assert_eq!(views.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(views.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_refresh_for_non_success_outcomes() {
        for status in [
            SyncStatus::NoChanges,
            SyncStatus::NotConfigured,
            SyncStatus::Failed,
        ] {
            let views = CountingViews::new();
            let (controller, ctx, task, _dir) = harness(status, views.clone());
            ctx.settings
                .set("sync.refresh_widgets", serde_json::Value::Bool(true))
                .unwrap();

            let runner = tokio::spawn(async move { task.run(&ctx).await });
            tokio::time::sleep(Duration::from_secs(8)).await;
            controller.shutdown();
            runner.await.unwrap().unwrap();

            assert_eq!(views.refreshes.load(Ordering::SeqCst), 0);
        }
    }
}
