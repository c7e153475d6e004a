//! Background service tasks.
//!
//! This module provides the service layer's task model:
//!
//! - **Task trait**: the interface every background service implements
//! - **TaskContext**: shared control handles and structured logging
//! - **Supervisor**: spawns each task as an independent unit of execution
//!   and applies the generic failure policy
//!
//! Tasks never call one another; all coordination goes through the shared
//! [`AbortSignal`](crate::control::AbortSignal) and
//! [`PauseGate`](crate::control::PauseGate). One-shot tasks return after a
//! bounded sequence of idempotent side effects; recurring tasks loop until
//! shutdown.

pub mod maintenance;
pub mod startup;
pub mod sync;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use uuid::Uuid;

use crate::control::{AbortSignal, PauseGate};
use crate::error::StewardError;
use crate::settings::Settings;

pub use maintenance::{MaintenanceService, MaintenanceTask};
pub use startup::{BootstrapProfileTask, InitCachesTask, PurgeSubtitlesTask};
pub use sync::{SyncMonitorTask, SyncService, SyncStatus, ViewRefresher};

/// How a task relates to the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs once per process start and returns.
    OneShot,
    /// Loops until shutdown.
    Recurring,
}

/// Error type for task failures.
#[derive(Debug, Clone)]
pub struct TaskError {
    /// Error message
    pub message: String,
    /// Whether a later run can reasonably succeed
    pub retryable: bool,
}

impl TaskError {
    /// A transient failure; the next eligibility window will retry.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A permanent failure; retrying without intervention is pointless.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<StewardError> for TaskError {
    fn from(error: StewardError) -> Self {
        Self {
            retryable: error.is_retryable(),
            message: error.to_string(),
        }
    }
}

/// Result type for task execution.
pub type TaskResult = std::result::Result<(), TaskError>;

/// Context passed to tasks during execution.
#[derive(Clone)]
pub struct TaskContext {
    /// Unique id for this task run, for log correlation
    pub run_id: Uuid,
    /// Task name, duplicated here so helpers can log it
    pub task_name: &'static str,
    /// Shutdown observer; checked at every suspension point
    pub signal: AbortSignal,
    /// Foreground-activity gate honored by recurring tasks
    pub pause: Arc<PauseGate>,
    /// Runtime settings, re-read each cycle
    pub settings: Arc<Settings>,
}

impl TaskContext {
    pub fn new(
        task_name: &'static str,
        signal: AbortSignal,
        pause: Arc<PauseGate>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_name,
            signal,
            pause,
            settings,
        }
    }

    /// Log a message associated with this task.
    pub fn log_info(&self, message: &str) {
        tracing::info!(task = %self.task_name, run_id = %self.run_id, message);
    }

    /// Log a warning associated with this task.
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(task = %self.task_name, run_id = %self.run_id, message);
    }

    /// Log an error associated with this task.
    pub fn log_error(&self, message: &str) {
        tracing::error!(task = %self.task_name, run_id = %self.run_id, message);
    }
}

/// The interface every background service task implements.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique name for this task, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Lifetime classification, for reporting only.
    fn kind(&self) -> TaskKind {
        TaskKind::OneShot
    }

    /// Execute the task.
    ///
    /// One-shot tasks perform their side effects and return; recurring tasks
    /// are expected to loop internally and return only once
    /// `ctx.signal` fires. Errors propagate to the supervisor's generic
    /// failure handler; they never stop sibling tasks.
    async fn run(&self, ctx: &TaskContext) -> TaskResult;
}

/// Statistics kept by the supervisor.
#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    /// Tasks that returned Ok
    pub completed: Arc<AtomicU64>,
    /// Tasks that returned Err
    pub failed: Arc<AtomicU64>,
    /// Tasks currently running
    pub active: Arc<AtomicU64>,
}

impl SupervisorStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }
}

/// Starts every registered task as an independent tokio task.
///
/// No ordering is guaranteed between tasks; each gets its own
/// [`TaskContext`] over the same shared control handles.
pub struct Supervisor {
    tasks: Vec<Arc<dyn Task>>,
    pause: Arc<PauseGate>,
    settings: Arc<Settings>,
}

impl Supervisor {
    pub fn new(pause: Arc<PauseGate>, settings: Arc<Settings>) -> Self {
        Self {
            tasks: Vec::new(),
            pause,
            settings,
        }
    }

    /// Register a task to be started. Order of registration carries no
    /// scheduling meaning.
    pub fn register(&mut self, task: Arc<dyn Task>) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Spawn all registered tasks, returning a handle for joining them.
    pub fn start(&self, signal: &AbortSignal) -> SupervisorHandle {
        let stats = SupervisorStats::default();
        let mut handles = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let task = task.clone();
            let ctx = TaskContext::new(
                task.name(),
                signal.clone(),
                self.pause.clone(),
                self.settings.clone(),
            );
            let stats = stats.clone();

            let kind = task.kind();
            handles.push(tokio::spawn(async move {
                stats.active.fetch_add(1, Ordering::Relaxed);
                tracing::info!(task = %ctx.task_name, run_id = %ctx.run_id, kind = ?kind, "Task starting");

                match task.run(&ctx).await {
                    Ok(()) => {
                        stats.completed.fetch_add(1, Ordering::Relaxed);
                        counter!("steward_tasks_completed", "task" => ctx.task_name).increment(1);
                        tracing::info!(task = %ctx.task_name, run_id = %ctx.run_id, "Task finished");
                    }
                    Err(error) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        counter!("steward_tasks_failed", "task" => ctx.task_name).increment(1);
                        tracing::error!(
                            task = %ctx.task_name,
                            run_id = %ctx.run_id,
                            error = %error,
                            retryable = error.retryable,
                            "Task failed"
                        );
                    }
                }
                stats.active.fetch_sub(1, Ordering::Relaxed);
            }));
        }

        SupervisorHandle { handles, stats }
    }
}

/// Handle over the spawned tasks.
pub struct SupervisorHandle {
    handles: Vec<tokio::task::JoinHandle<()>>,
    stats: SupervisorStats,
}

impl SupervisorHandle {
    /// Wait for every task to return. Call after signalling shutdown.
    pub async fn join(self) -> SupervisorStats {
        for handle in self.handles {
            let _ = handle.await;
        }
        self.stats
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ShutdownController;
    use tempfile::tempdir;

    struct OkTask;

    #[async_trait]
    impl Task for OkTask {
        fn name(&self) -> &'static str {
            "ok_task"
        }

        async fn run(&self, _ctx: &TaskContext) -> TaskResult {
            Ok(())
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        fn name(&self) -> &'static str {
            "failing_task"
        }

        async fn run(&self, _ctx: &TaskContext) -> TaskResult {
            Err(TaskError::retryable("boom"))
        }
    }

    fn test_settings() -> (tempfile::TempDir, Arc<Settings>) {
        let dir = tempdir().unwrap();
        let settings = Arc::new(Settings::bootstrap(dir.path()).unwrap());
        (dir, settings)
    }

    #[test]
    fn test_task_error_conversion_keeps_retryability() {
        let err: TaskError = StewardError::Config("bad".into()).into();
        assert!(!err.retryable);

        let err: TaskError = StewardError::Io(std::io::Error::other("disk")).into();
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn test_one_shot_failure_does_not_affect_siblings() {
        let (_dir, settings) = test_settings();
        let controller = ShutdownController::new();
        let pause = Arc::new(PauseGate::new());

        let mut supervisor = Supervisor::new(pause, settings);
        supervisor.register(Arc::new(OkTask));
        supervisor.register(Arc::new(FailingTask));
        supervisor.register(Arc::new(OkTask));

        let handle = supervisor.start(&controller.signal());
        let stats = handle.join().await;

        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.active(), 0);
    }
}
