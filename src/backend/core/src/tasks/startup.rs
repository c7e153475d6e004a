//! One-shot startup tasks.
//!
//! Each runs exactly once per process start, performs a bounded sequence of
//! idempotent side effects, and returns. Errors propagate to the
//! supervisor's generic failure handler; the host retries naturally on the
//! next process start.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Task, TaskContext, TaskError, TaskResult};
use crate::cache::CacheStore;
use crate::error::Result;

/// Subtitle artifacts the player leaves in the scratch directory.
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ssa", "smi", "sub", "idx"];

/// Prefix for subtitle files this service downloaded itself.
const SUBTITLE_PREFIX: &str = "steward_subs_";

/// Make sure the profile settings document is complete and stamped with the
/// running version.
pub struct BootstrapProfileTask {
    version: String,
}

impl BootstrapProfileTask {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

#[async_trait]
impl Task for BootstrapProfileTask {
    fn name(&self) -> &'static str {
        "bootstrap_profile"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        // Fill in any settings an upgrade introduced; existing values win.
        ctx.settings.ensure_defaults()?;

        let stamped = ctx.settings.get_str("service.version").unwrap_or_default();
        if stamped != self.version {
            ctx.settings
                .set("service.version", serde_json::Value::from(self.version.clone()))?;
            ctx.log_info(&format!("Version stamped: {} -> {}", stamped, self.version));
        }

        ctx.settings.reload()?;
        Ok(())
    }
}

/// Delete leftover subtitle files from the scratch directory.
pub struct PurgeSubtitlesTask {
    temp_dir: PathBuf,
}

impl PurgeSubtitlesTask {
    pub fn new(temp_dir: PathBuf) -> Self {
        Self { temp_dir }
    }

    fn purge(temp_dir: &std::path::Path) -> Result<usize> {
        if !temp_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(temp_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            let by_prefix = name.starts_with(SUBTITLE_PREFIX);
            let by_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SUBTITLE_EXTENSIONS.contains(&e));

            if by_prefix || by_extension {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Task for PurgeSubtitlesTask {
    fn name(&self) -> &'static str {
        "purge_subtitles"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let temp_dir = self.temp_dir.clone();
        let removed = tokio::task::spawn_blocking(move || Self::purge(&temp_dir))
            .await
            .map_err(|e| TaskError::fatal(format!("purge worker panicked: {e}")))?
            .map_err(TaskError::from)?;

        if removed > 0 {
            ctx.log_info(&format!("Removed {removed} leftover subtitle files"));
        }
        Ok(())
    }
}

/// Create the cache database schema if this is a fresh install.
pub struct InitCachesTask {
    store: Arc<CacheStore>,
}

impl InitCachesTask {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Task for InitCachesTask {
    fn name(&self) -> &'static str {
        "init_caches"
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.ensure_schema())
            .await
            .map_err(|e| TaskError::fatal(format!("schema worker panicked: {e}")))?
            .map_err(TaskError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{PauseGate, ShutdownController};
    use crate::settings::Settings;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn context_for(dir: &std::path::Path, name: &'static str) -> (ShutdownController, TaskContext) {
        let controller = ShutdownController::new();
        let ctx = TaskContext::new(
            name,
            controller.signal(),
            Arc::new(PauseGate::new()),
            Arc::new(Settings::bootstrap(dir).unwrap()),
        );
        (controller, ctx)
    }

    #[tokio::test]
    async fn test_bootstrap_stamps_version_idempotently() {
        let dir = tempdir().unwrap();
        let (_controller, ctx) = context_for(dir.path(), "bootstrap_profile");

        let task = BootstrapProfileTask::new("1.2.0");
        task.run(&ctx).await.unwrap();
        assert_eq!(ctx.settings.get_str("service.version").unwrap(), "1.2.0");

        // Running again on the same profile is a no-op.
        task.run(&ctx).await.unwrap();
        assert_eq!(ctx.settings.get_str("service.version").unwrap(), "1.2.0");
    }

    #[tokio::test]
    async fn test_purge_matches_prefix_and_extensions() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&temp).unwrap();
        for name in [
            "movie.srt",
            "movie.idx",
            "steward_subs_000.dat",
            "keep.nfo",
            "keep.txt",
        ] {
            std::fs::write(temp.join(name), b"x").unwrap();
        }

        let (_controller, ctx) = context_for(dir.path(), "purge_subtitles");
        PurgeSubtitlesTask::new(temp.clone()).run(&ctx).await.unwrap();

        let remaining: Vec<String> = std::fs::read_dir(&temp)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&"keep.nfo".to_string()));
        assert!(remaining.contains(&"keep.txt".to_string()));
    }

    #[tokio::test]
    async fn test_purge_missing_directory_is_noop() {
        let dir = tempdir().unwrap();
        let (_controller, ctx) = context_for(dir.path(), "purge_subtitles");

        let task = PurgeSubtitlesTask::new(dir.path().join("does-not-exist"));
        task.run(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_init_caches_safe_to_rerun() {
        let dir = tempdir().unwrap();
        let (_controller, ctx) = context_for(dir.path(), "init_caches");
        let store = Arc::new(CacheStore::open(&dir.path().join("cache.db")).unwrap());

        let task = InitCachesTask::new(store.clone());
        tokio_test::assert_ok!(task.run(&ctx).await);
        tokio_test::assert_ok!(task.run(&ctx).await);

        store.put_metadata("movie:1", "{}", 10).unwrap();
        assert_eq!(store.metadata_len().unwrap(), 1);
    }
}
