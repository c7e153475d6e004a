//! Local cache database.
//!
//! The host renders its menus from two cache tables: `metadata_cache`
//! (per-item metadata payloads) and `list_cache` (assembled remote list
//! contents). Both carry an `expires` epoch-seconds column; expired rows are
//! reclaimed by the periodic maintenance pass.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::tasks::maintenance::MaintenanceService;
use crate::tasks::{TaskError, TaskResult};

/// Handle to the cache database. Cheap to share behind an [`Arc`]; all
/// methods are blocking and must be driven through `spawn_blocking` from
/// async contexts.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the cache tables if they do not exist yet. Idempotent.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata_cache (
                 key     TEXT PRIMARY KEY,
                 payload TEXT NOT NULL,
                 expires INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS list_cache (
                 list_id TEXT PRIMARY KEY,
                 payload TEXT NOT NULL,
                 expires INTEGER NOT NULL
             );",
        )?;
        Ok(())
    }

    pub fn put_metadata(&self, key: &str, payload: &str, expires: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO metadata_cache (key, payload, expires) VALUES (?1, ?2, ?3)",
            params![key, payload, expires],
        )?;
        Ok(())
    }

    pub fn put_list(&self, list_id: &str, payload: &str, expires: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO list_cache (list_id, payload, expires) VALUES (?1, ?2, ?3)",
            params![list_id, payload, expires],
        )?;
        Ok(())
    }

    /// Delete rows whose `expires` is at or before `now`. Returns the number
    /// of rows reclaimed across both tables.
    pub fn prune_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let metadata = conn.execute(
            "DELETE FROM metadata_cache WHERE expires <= ?1",
            params![now],
        )?;
        let lists = conn.execute("DELETE FROM list_cache WHERE expires <= ?1", params![now])?;
        Ok(metadata + lists)
    }

    /// Drop every assembled list so the next render rebuilds from the remote
    /// account. Used by the sync monitor's one-time startup invalidation.
    pub fn clear_lists(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM list_cache", [])?;
        Ok(removed)
    }

    /// Reclaim file space after pruning.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("VACUUM")?;
        Ok(())
    }

    pub fn metadata_len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM metadata_cache", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn list_len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM list_cache", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

/// Maintenance collaborator backed by [`CacheStore`]: prune expired rows,
/// then vacuum. Idempotent on retry.
pub struct CacheMaintenance {
    store: Arc<CacheStore>,
}

impl CacheMaintenance {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MaintenanceService for CacheMaintenance {
    async fn run(&self, now: i64) -> TaskResult {
        let store = self.store.clone();
        let pruned = tokio::task::spawn_blocking(move || -> Result<usize> {
            let pruned = store.prune_expired(now)?;
            store.vacuum()?;
            Ok(pruned)
        })
        .await
        .map_err(|e| TaskError::fatal(format!("maintenance worker panicked: {e}")))?
        .map_err(TaskError::from)?;

        tracing::debug!(pruned, "Cache maintenance pass complete");
        Ok(())
    }
}
