//! Error types for value parsing in pulsefeed-types.

use thiserror::Error;

/// Errors that can occur when constructing or parsing pulsefeed values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The hardware address is not six hex octets.
    #[error("Invalid device address: '{0}'")]
    InvalidDeviceId(String),

    /// A window whose end does not come after its start.
    #[error("Invalid window: end {end} is not after start {start}")]
    InvalidWindow {
        /// Formatted start instant.
        start: String,
        /// Formatted end instant.
        end: String,
    },

    /// A timestamp that could not be parsed or formatted.
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// The offending input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type alias using pulsefeed-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
