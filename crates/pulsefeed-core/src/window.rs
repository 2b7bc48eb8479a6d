//! Window calculation for acquisition cycles.
//!
//! Two modes are supported:
//!
//! - [`WindowMode::Relative`] re-anchors every window to the supplied `now`,
//!   so consecutive windows overlap or leave gaps depending on how long a
//!   cycle took. That is accepted as-is.
//! - [`WindowMode::FixedAdvance`] starts at a seed instant and advances by
//!   exactly one window length per call, independent of wall-clock time. This
//!   is used to replay or backfill a past interval.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pulsefeed_core::window::WindowCalculator;
//! use time::macros::datetime;
//!
//! let seed = datetime!(2025-05-15 16:23:00 +3);
//! let mut calc = WindowCalculator::fixed_advance(seed, Duration::from_secs(60)).unwrap();
//!
//! let first = calc.next_window(datetime!(2030-01-01 00:00:00 UTC)).unwrap();
//! let second = calc.next_window(datetime!(2030-01-01 00:00:00 UTC)).unwrap();
//! assert_eq!(first.start(), seed);
//! assert_eq!(second.start(), first.end());
//! ```

use std::time::Duration;

use time::OffsetDateTime;

use pulsefeed_types::Window;

use crate::error::{Error, Result};

/// How windows are anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// `[now - length, now)` on every call.
    Relative,
    /// Start at `seed`, then advance by one length per call.
    FixedAdvance {
        /// First window start.
        seed: OffsetDateTime,
    },
}

/// Derives the `[start, end)` interval for each cycle.
#[derive(Debug, Clone)]
pub struct WindowCalculator {
    mode: WindowMode,
    length: Duration,
    previous_start: Option<OffsetDateTime>,
}

impl WindowCalculator {
    /// Create a calculator. `length` must be non-zero.
    pub fn new(mode: WindowMode, length: Duration) -> Result<Self> {
        if length.is_zero() {
            return Err(Error::invalid_config("window length must be non-zero"));
        }
        Ok(Self {
            mode,
            length,
            previous_start: None,
        })
    }

    /// Relative-to-now calculator.
    pub fn relative(length: Duration) -> Result<Self> {
        Self::new(WindowMode::Relative, length)
    }

    /// Fixed-advance calculator seeded at `seed`.
    pub fn fixed_advance(seed: OffsetDateTime, length: Duration) -> Result<Self> {
        Self::new(WindowMode::FixedAdvance { seed }, length)
    }

    /// The configured mode.
    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    /// The configured window length.
    pub fn length(&self) -> Duration {
        self.length
    }

    /// Compute the next window.
    ///
    /// `now` is only consulted in relative mode.
    pub fn next_window(&mut self, now: OffsetDateTime) -> Result<Window> {
        let window = match self.mode {
            WindowMode::Relative => Window::ending_at(now, self.length)?,
            WindowMode::FixedAdvance { seed } => match self.previous_start {
                None => Window::starting_at(seed, self.length)?,
                // The previous window's end is previous_start + length.
                Some(previous) => {
                    let start = Window::starting_at(previous, self.length)?.end();
                    Window::starting_at(start, self.length)?
                }
            },
        };
        self.previous_start = Some(window.start());
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_zero_length_rejected() {
        assert!(matches!(
            WindowCalculator::relative(Duration::ZERO),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_relative_window_ends_at_now() {
        let mut calc = WindowCalculator::relative(MINUTE).unwrap();
        let now = datetime!(2025-05-15 16:23:00 +3);
        let window = calc.next_window(now).unwrap();
        assert_eq!(window.end(), now);
        assert_eq!(window.start(), datetime!(2025-05-15 16:22:00 +3));
    }

    #[test]
    fn test_relative_windows_may_overlap_or_gap() {
        let mut calc = WindowCalculator::relative(MINUTE).unwrap();
        let t0 = datetime!(2025-05-15 16:23:00 UTC);

        let a = calc.next_window(t0).unwrap();
        // Short cycle: overlap.
        let b = calc.next_window(t0 + Duration::from_secs(5)).unwrap();
        assert!(b.start() < a.end());
        // Long cycle: gap.
        let c = calc.next_window(t0 + Duration::from_secs(300)).unwrap();
        assert!(c.start() > b.end());
    }

    #[test]
    fn test_fixed_advance_first_window_starts_at_seed() {
        let seed = datetime!(2025-05-15 16:23:00 +3);
        let mut calc = WindowCalculator::fixed_advance(seed, MINUTE).unwrap();
        let window = calc.next_window(OffsetDateTime::now_utc()).unwrap();
        assert_eq!(window.start(), seed);
        assert_eq!(window.end(), datetime!(2025-05-15 16:24:00 +3));
    }

    #[test]
    fn test_fixed_advance_ignores_wall_clock() {
        let seed = datetime!(2025-05-15 16:23:00 +3);
        let mut calc = WindowCalculator::fixed_advance(seed, MINUTE).unwrap();

        let nows = [
            datetime!(2026-01-01 00:00:00 UTC),
            datetime!(2026-01-01 00:00:01 UTC),
            datetime!(2026-03-01 12:00:00 UTC),
        ];
        let windows: Vec<_> = nows.iter().map(|n| calc.next_window(*n).unwrap()).collect();

        assert_eq!(windows[1].start(), windows[0].start() + MINUTE);
        assert_eq!(windows[2].start(), windows[1].start() + MINUTE);
    }

    #[test]
    fn test_fixed_advance_overflow_is_an_error() {
        let seed = datetime!(9999-12-31 23:59:00 UTC);
        let mut calc = WindowCalculator::fixed_advance(seed, MINUTE * 10).unwrap();
        assert!(calc.next_window(OffsetDateTime::now_utc()).is_err());
    }
}

/// Property-based tests for window invariants.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn instant(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    proptest! {
        #[test]
        fn windows_have_configured_length(
            length_secs in 1u64..86_400,
            now_secs in 0i64..4_000_000_000,
            relative in any::<bool>(),
        ) {
            let length = Duration::from_secs(length_secs);
            let mut calc = if relative {
                WindowCalculator::relative(length).unwrap()
            } else {
                WindowCalculator::fixed_advance(instant(now_secs), length).unwrap()
            };

            for step in 0..5i64 {
                let window = calc.next_window(instant(now_secs + step * 7)).unwrap();
                prop_assert!(window.end() > window.start());
                prop_assert_eq!(window.duration(), time::Duration::seconds(length_secs as i64));
            }
        }

        #[test]
        fn fixed_advance_is_contiguous(
            length_secs in 1u64..86_400,
            seed_secs in 0i64..4_000_000_000,
            delays in proptest::collection::vec(0i64..100_000, 1..10),
        ) {
            let length = Duration::from_secs(length_secs);
            let mut calc = WindowCalculator::fixed_advance(instant(seed_secs), length).unwrap();

            let mut now = seed_secs;
            let mut previous = calc.next_window(instant(now)).unwrap();
            for delay in delays {
                now += delay;
                let next = calc.next_window(instant(now)).unwrap();
                prop_assert_eq!(next.start(), previous.start() + length);
                previous = next;
            }
        }
    }
}
