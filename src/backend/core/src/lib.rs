//! # Steward Core
//!
//! Background maintenance and sync service layer for the media-library
//! companion daemon.
//!
//! ## Architecture
//!
//! - **Control**: process-wide shutdown signal and foreground pause gate,
//!   observed cooperatively at every suspension point
//! - **Tasks**: one-shot startup actions, a threshold-gated maintenance pass,
//!   and a long-lived sync monitor, each running as an independent unit
//! - **Settings**: crash-consistent runtime settings document carrying the
//!   persisted maintenance due timestamp
//! - **Cache**: local sqlite-backed metadata/list caches and their
//!   maintenance collaborator
//! - **Remote**: HTTP collaborator reducing the remote account endpoint to a
//!   closed set of sync outcomes

pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod observability;
pub mod remote;
pub mod settings;
pub mod tasks;

pub use error::{Result, StewardError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheMaintenance, CacheStore};
    pub use crate::config::Config;
    pub use crate::control::{AbortSignal, PauseGate, ShutdownController};
    pub use crate::error::{Result, StewardError};
    pub use crate::remote::HttpSyncService;
    pub use crate::settings::Settings;
    pub use crate::tasks::{
        BootstrapProfileTask, InitCachesTask, MaintenanceService, MaintenanceTask,
        PurgeSubtitlesTask, Supervisor, SupervisorHandle, SupervisorStats, SyncMonitorTask,
        SyncService, SyncStatus, Task, TaskContext, TaskError, TaskKind, TaskResult,
        ViewRefresher,
    };
}
