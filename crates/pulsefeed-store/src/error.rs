//! Error types for pulsefeed-store.

use std::path::PathBuf;

/// Result type for pulsefeed-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pulsefeed-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to create a data directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read a file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file exists but does not hold the expected JSON.
    #[error("Corrupt file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The device registry lists no devices.
    #[error("Device registry {0} is empty")]
    EmptyRegistry(PathBuf),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
