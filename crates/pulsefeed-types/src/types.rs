//! Core types for wearable telemetry.

use core::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Canonical hardware address of a wearable device.
///
/// Addresses are normalized to upper-case hex octets separated by `:`, so
/// `ce-d6-ad-45-ed-75` and `CE:D6:AD:45:ED:75` compare equal.
///
/// # Examples
///
/// ```
/// use pulsefeed_types::DeviceId;
///
/// let id = DeviceId::parse("ce-d6-ad-45-ed-75").unwrap();
/// assert_eq!(id.as_str(), "CE:D6:AD:45:ED:75");
/// assert!(DeviceId::parse("not-a-mac").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct DeviceId(String);

impl DeviceId {
    /// Number of octets in a hardware address.
    pub const OCTETS: usize = 6;

    /// Parse and normalize a hardware address.
    pub fn parse(raw: &str) -> ParseResult<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace('-', ":");
        let octets: Vec<&str> = normalized.split(':').collect();

        let valid = octets.len() == Self::OCTETS
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

        if valid {
            Ok(Self(normalized))
        } else {
            Err(ParseError::InvalidDeviceId(raw.to_string()))
        }
    }

    /// The canonical address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last two octets, used to tell devices apart in log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[self.0.len() - 5..]
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// A device that takes part in acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Canonical hardware address.
    pub id: DeviceId,
    /// Human-readable name.
    pub name: String,
    /// Whether the device is polled.
    pub enabled: bool,
}

impl Device {
    /// Create an enabled device.
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
        }
    }

    /// Short label for log lines, e.g. `swaid 1330 [ED:75]`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} [{}]", self.name, self.id.short())
    }
}

/// Identifier of an acquisition session.
///
/// Numeric session names are kept as numbers so downstream tooling can sort
/// and filter on them; anything else is kept as text.
///
/// # Examples
///
/// ```
/// use pulsefeed_types::SessionId;
///
/// assert_eq!(SessionId::parse("42"), SessionId::Numeric(42));
/// assert_eq!(SessionId::parse("lab-a"), SessionId::Named("lab-a".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum SessionId {
    /// A session named by a number.
    Numeric(i64),
    /// Any other session name.
    Named(String),
}

impl SessionId {
    /// Interpret a session name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        name.parse::<i64>()
            .map(SessionId::Numeric)
            .unwrap_or_else(|_| SessionId::Named(name.to_string()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Numeric(n) => write!(f, "{}", n),
            SessionId::Named(s) => f.write_str(s),
        }
    }
}

/// Derived heart-rate metrics for a single sample.
///
/// Every field is independently optional: the server reports `null` when a
/// metric could not be computed, and that is distinct from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metrics {
    /// Heart rate in beats per minute.
    pub hr: Option<f64>,
    /// Ratio of low- to high-frequency HRV power.
    pub lf_hf_ratio: Option<f64>,
    /// Root mean square of successive RR differences, ms.
    pub rmssd: Option<f64>,
    /// Standard deviation of RR intervals, ms.
    pub sdrr: Option<f64>,
    /// Stress index.
    pub si: Option<f64>,
}

impl Metrics {
    /// Names of the metric fields, in the order the endpoint lists them.
    pub const NAMES: [&'static str; 5] = ["hr", "lf_hf_ratio", "rmssd", "sdrr", "si"];

    /// Returns `true` if no metric is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hr.is_none()
            && self.lf_hf_ratio.is_none()
            && self.rmssd.is_none()
            && self.sdrr.is_none()
            && self.si.is_none()
    }
}

/// One sample collected for one device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    /// Session the sample was collected under.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub session: Option<SessionId>,
    /// Device the sample belongs to.
    #[cfg_attr(feature = "serde", serde(rename = "device_mac"))]
    pub device_id: DeviceId,
    /// Device name at collection time.
    pub device_name: String,
    /// Sample time as reported by the server.
    pub timestamp: String,
    /// The sample's metrics.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub metrics: Metrics,
}

impl Measurement {
    /// Create a measurement for `device`.
    pub fn new(device: &Device, timestamp: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            session: None,
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            timestamp: timestamp.into(),
            metrics,
        }
    }

    /// Tag the measurement with a session.
    #[must_use]
    pub fn with_session(mut self, session: Option<SessionId>) -> Self {
        self.session = session;
        self
    }
}
