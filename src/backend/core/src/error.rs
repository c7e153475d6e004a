//! Error handling for Steward Core.
//!
//! This module provides:
//! - The crate-wide [`StewardError`] type covering the configuration,
//!   settings, and cache layers
//! - A specialized [`Result`] alias
//! - Retryability classification consumed by the task failure handler

use thiserror::Error;

/// A specialized Result type for Steward operations.
pub type Result<T> = std::result::Result<T, StewardError>;

/// Errors produced by the service layer's own infrastructure.
///
/// Outcomes of the remote sync attempt are deliberately *not* errors; they
/// are reported through [`crate::tasks::sync::SyncStatus`].
#[derive(Debug, Error)]
pub enum StewardError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem operation failed (settings document, temp cleanup).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document could not be serialized or parsed.
    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache database operation failed.
    #[error("cache database error: {0}")]
    Cache(#[from] rusqlite::Error),
}

impl StewardError {
    /// Whether a retry at the next eligibility window can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Serialization(_) => false,
            Self::Io(_) | Self::Cache(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(!StewardError::Config("missing field".into()).is_retryable());

        let io = StewardError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(io.is_retryable());
    }

    #[test]
    fn test_display_includes_source() {
        let io = StewardError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "settings.json",
        ));
        assert!(io.to_string().contains("settings.json"));
    }
}
