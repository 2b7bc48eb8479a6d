//! Time windows requested from the telemetry endpoint.

use core::fmt;
use std::time::Duration;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{ParseError, ParseResult};

/// Fixed-width format the endpoint expects for `start` and `end`.
pub const API_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");

/// Format used when logging window bounds.
pub const LOG_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

/// A half-open `[start, end)` interval of time.
///
/// The constructor guarantees `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl Window {
    /// Create a window, rejecting empty or inverted intervals.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> ParseResult<Self> {
        if end <= start {
            return Err(ParseError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Window of `length` beginning at `start`.
    pub fn starting_at(start: OffsetDateTime, length: Duration) -> ParseResult<Self> {
        let end = time::Duration::try_from(length)
            .ok()
            .and_then(|d| start.checked_add(d))
            .ok_or_else(|| out_of_range(start))?;
        Self::new(start, end)
    }

    /// Window of `length` ending at `end`.
    pub fn ending_at(end: OffsetDateTime, length: Duration) -> ParseResult<Self> {
        let start = time::Duration::try_from(length)
            .ok()
            .and_then(|d| end.checked_sub(d))
            .ok_or_else(|| out_of_range(end))?;
        Self::new(start, end)
    }

    /// Inclusive start.
    #[must_use]
    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    /// Exclusive end.
    #[must_use]
    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> time::Duration {
        self.end - self.start
    }

    /// The `(start, end)` request parameters, rendered in `offset`.
    pub fn to_params(&self, offset: UtcOffset) -> ParseResult<(String, String)> {
        Ok((
            format_api_timestamp(self.start, offset)?,
            format_api_timestamp(self.end, offset)?,
        ))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self
            .start
            .format(LOG_TIMESTAMP_FORMAT)
            .map_err(|_| fmt::Error)?;
        let end = self.end.format(LOG_TIMESTAMP_FORMAT).map_err(|_| fmt::Error)?;
        write!(f, "[{} .. {})", start, end)
    }
}

fn out_of_range(anchor: OffsetDateTime) -> ParseError {
    ParseError::InvalidTimestamp {
        value: anchor.to_string(),
        reason: "window bound out of range".to_string(),
    }
}

/// Render an instant the way the endpoint expects, in the given offset.
///
/// # Examples
///
/// ```
/// use pulsefeed_types::window::format_api_timestamp;
/// use time::macros::{datetime, offset};
///
/// let t = datetime!(2025-05-15 13:23:00 UTC);
/// assert_eq!(format_api_timestamp(t, offset!(+3)).unwrap(), "2025-05-15-16-23-00");
/// ```
pub fn format_api_timestamp(instant: OffsetDateTime, offset: UtcOffset) -> ParseResult<String> {
    instant
        .to_offset(offset)
        .format(API_TIMESTAMP_FORMAT)
        .map_err(|e| ParseError::InvalidTimestamp {
            value: instant.to_string(),
            reason: e.to_string(),
        })
}

/// Parse an endpoint-format timestamp, interpreting it in `offset`.
pub fn parse_api_timestamp(value: &str, offset: UtcOffset) -> ParseResult<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), API_TIMESTAMP_FORMAT)
        .map(|dt| dt.assume_offset(offset))
        .map_err(|e| ParseError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a `+HH:MM` / `-HH:MM` UTC offset.
pub fn parse_utc_offset(value: &str) -> ParseResult<UtcOffset> {
    UtcOffset::parse(
        value.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|e| ParseError::InvalidTimestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
