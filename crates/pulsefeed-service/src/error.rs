//! Service-level errors.

use crate::config::ConfigError;

/// Errors that stop the collector.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Store(#[from] pulsefeed_store::Error),
    #[error("Acquisition error: {0}")]
    Core(#[from] pulsefeed_core::Error),
    #[error("No enabled devices in registry {0}")]
    NoEnabledDevices(std::path::PathBuf),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, ServiceError>;
