//! Runtime settings document.
//!
//! Settings are a flat JSON object of dotted keys (`"sync.interval_mins"`,
//! `"maintenance.due"`) persisted in the profile directory. Unlike the static
//! bootstrap [`crate::config::Config`], this document is mutable at runtime:
//! the UI layer edits it while tasks are running, and tasks re-read values on
//! every cycle.
//!
//! Persistence is crash-consistent: every write lands in a temp file in the
//! same directory and is renamed over the target, so a crash mid-write leaves
//! the previous document intact. Due timestamps in particular are only
//! advanced after the corresponding maintenance pass succeeded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{Result, StewardError};

/// Name of the settings document inside the profile directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Floor for the configurable sync interval.
const MIN_SYNC_INTERVAL_MINS: i64 = 1;

/// Shared, file-backed runtime settings.
///
/// Reads hit an in-memory snapshot; writes update the snapshot and persist
/// the whole document atomically.
pub struct Settings {
    path: PathBuf,
    doc: RwLock<Map<String, Value>>,
}

impl Settings {
    /// Ensure the profile directory and settings document exist, then load.
    ///
    /// Safe to invoke on every process start: the directory is created if
    /// absent and defaults are written only when no document exists yet.
    pub fn bootstrap(profile_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(profile_dir)?;
        let path = profile_dir.join(SETTINGS_FILE);
        if !path.exists() {
            let defaults = Self::default_document();
            write_atomic(&path, &serde_json::to_vec_pretty(&Value::Object(defaults))?)?;
        }
        Self::load(path)
    }

    /// Load an existing settings document.
    pub fn load(path: PathBuf) -> Result<Self> {
        let raw = std::fs::read(&path)?;
        let doc: Map<String, Value> = serde_json::from_slice(&raw)?;
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Re-read the document from disk, replacing the in-memory snapshot.
    pub fn reload(&self) -> Result<()> {
        let raw = std::fs::read(&self.path)?;
        let doc: Map<String, Value> = serde_json::from_slice(&raw)?;
        *self.doc.write() = doc;
        Ok(())
    }

    /// Write any keys from the default document that are missing, e.g. after
    /// an upgrade introduced new settings. Present values are left untouched.
    pub fn ensure_defaults(&self) -> Result<()> {
        let mut changed = false;
        {
            let mut doc = self.doc.write();
            for (key, value) in Self::default_document() {
                if !doc.contains_key(&key) {
                    doc.insert(key, value);
                    changed = true;
                }
            }
        }
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn default_document() -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("service.version".into(), Value::String(String::new()));
        doc.insert("sync.interval_mins".into(), Value::from(30));
        doc.insert("sync.refresh_widgets".into(), Value::Bool(false));
        doc.insert("maintenance.due".into(), Value::from(0));
        doc
    }

    /// Raw read of a settings value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.doc.read().get(key).cloned()
    }

    /// Raw write of a settings value, persisted before returning.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.doc.write().insert(key.to_string(), value);
        self.persist()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => b,
            _ => default,
        }
    }

    /// Recurring sync interval. Mutable at runtime; tasks must re-read this
    /// every cycle rather than caching it at start.
    pub fn sync_interval(&self) -> Duration {
        let mins = self
            .get_i64("sync.interval_mins", 30)
            .max(MIN_SYNC_INTERVAL_MINS);
        Duration::from_secs(mins as u64 * 60)
    }

    /// The sync interval in whole minutes, for log messages.
    pub fn sync_interval_mins(&self) -> i64 {
        self.get_i64("sync.interval_mins", 30).max(MIN_SYNC_INTERVAL_MINS)
    }

    /// Whether home-screen widgets should be refreshed after a successful sync.
    pub fn refresh_widgets(&self) -> bool {
        self.get_bool("sync.refresh_widgets", false)
    }

    /// Earliest allowed next-run time for a threshold-gated task, as epoch
    /// seconds. Unset means always eligible.
    pub fn due_timestamp(&self, key: &str) -> i64 {
        self.get_i64(key, 0)
    }

    /// Advance a due timestamp. Call only after the run succeeded.
    pub fn set_due_timestamp(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, Value::from(value))
    }

    fn persist(&self) -> Result<()> {
        let bytes = {
            let doc = self.doc.read();
            serde_json::to_vec_pretty(&Value::Object(doc.clone()))?
        };
        write_atomic(&self.path, &bytes)
    }
}

/// Write via a temp file in the same directory plus rename, so readers never
/// observe a partial document.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).map_err(StewardError::Io)
}
