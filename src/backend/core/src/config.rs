//! Static bootstrap configuration.
//!
//! Loaded once at process start from `steward.toml` and `STEWARD__`-prefixed
//! environment variables. Values the UI may edit at runtime (sync interval,
//! widget-refresh flag) live in [`crate::settings::Settings`] instead.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Main service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Filesystem layout
    #[serde(default)]
    pub service: ServiceConfig,

    /// Task scheduling knobs
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Remote sync endpoint
    #[serde(default)]
    pub sync: SyncConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Profile directory holding the settings document and cache database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Scratch directory scanned by the subtitle purge task
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Poll granularity for pause gating and sleep slicing; bounds worst-case
    /// shutdown latency
    #[serde(with = "humantime_serde", default = "default_pause_tick")]
    pub pause_tick: Duration,

    /// Delay before the maintenance pass starts, to stay clear of process
    /// start contention
    #[serde(with = "humantime_serde", default = "default_grace_delay")]
    pub grace_delay: Duration,

    /// Delay after the sync monitor's one-time cache invalidation
    #[serde(with = "humantime_serde", default = "default_settle_delay")]
    pub settle_delay: Duration,

    /// How far the maintenance due timestamp advances after a successful pass
    #[serde(with = "humantime_serde", default = "default_maintenance_interval")]
    pub maintenance_interval: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            pause_tick: default_pause_tick(),
            grace_delay: default_grace_delay(),
            settle_delay: default_settle_delay(),
            maintenance_interval: default_maintenance_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Activities endpoint of the remote watch-history account
    pub endpoint: Option<String>,

    /// Bearer token; absent means no account is configured
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_temp_dir() -> PathBuf { PathBuf::from("data/tmp") }
fn default_pause_tick() -> Duration { Duration::from_secs(10) }
fn default_grace_delay() -> Duration { Duration::from_secs(10) }
fn default_settle_delay() -> Duration { Duration::from_secs(5) }
fn default_maintenance_interval() -> Duration { Duration::from_secs(3 * 24 * 3600) }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }

impl Config {
    /// Load configuration from environment and config files.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("steward").required(false))
            .add_source(config::Environment::with_prefix("STEWARD").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("STEWARD").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scheduling.pause_tick, Duration::from_secs(10));
        assert_eq!(
            config.scheduling.maintenance_interval,
            Duration::from_secs(259_200)
        );
        assert!(config.sync.token.is_none());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_durations_parse_from_humantime() {
        let toml = r#"
            [scheduling]
            pause_tick = "2s"
            maintenance_interval = "1day"
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.scheduling.pause_tick, Duration::from_secs(2));
        assert_eq!(
            config.scheduling.maintenance_interval,
            Duration::from_secs(86_400)
        );
        // Unspecified leaves fall back to their defaults.
        assert_eq!(config.scheduling.settle_delay, Duration::from_secs(5));
    }
}
