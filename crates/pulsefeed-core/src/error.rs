//! Error types for pulsefeed-core.
//!
//! # Failure isolation
//!
//! Fetch errors never leave the worker task that produced them: the pool
//! turns them into a per-device [`FetchOutcome`](crate::pool::FetchOutcome)
//! and the cycle carries on with the remaining devices. Only pool misuse
//! ([`Error::PoolClosed`]) and bad configuration surface to the caller.
//!
//! | Error | Outcome kind | Counts as "server responded" |
//! |-------|--------------|------------------------------|
//! | [`Error::Http`] | transport failure | no |
//! | [`Error::Connection`] | transport failure | no |
//! | [`Error::Timeout`] | transport failure | no |
//! | [`Error::Status`] | transport failure | yes |
//! | [`Error::Decode`] | decode failure | yes |
//!
//! There is no retry: each device gets a single attempt per cycle.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while acquiring telemetry.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request failed before any response arrived.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The endpoint answered with a non-success status.
    #[error("Endpoint returned HTTP {status} for {device_name}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `device_name` request parameter.
        device_name: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The response body was not a telemetry payload.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A value could not be built or parsed.
    #[error(transparent)]
    Parse(#[from] pulsefeed_types::ParseError),

    /// Dispatch attempted after the pool was shut down.
    #[error("Fetch pool is shut down")]
    PoolClosed,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the endpoint produced a response before this error occurred.
    #[must_use]
    pub fn server_responded(&self) -> bool {
        matches!(self, Error::Status { .. } | Error::Decode(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Result type alias using pulsefeed-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
