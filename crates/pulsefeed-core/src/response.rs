//! Decoding of telemetry endpoint responses.
//!
//! The endpoint answers either with a sentinel object:
//!
//! ```json
//! {"message": "No data found for the specified device."}
//! ```
//!
//! or with one array per metric plus a `time` array, all indexed by sample:
//!
//! ```json
//! {"hr": [71, 72], "lf_hf_ratio": [1.2, null], "rmssd": [40, 41],
//!  "sdrr": [55, 54], "si": [120.5, 118.0], "time": ["2025-05-15 16:23:01", "2025-05-15 16:23:02"]}
//! ```
//!
//! Arrays are zipped by position. When their lengths differ only the common
//! prefix yields samples. A metric whose array is missing altogether is
//! reported as `None` for every sample rather than truncating the batch.

use serde::Deserialize;

use pulsefeed_types::{Device, Measurement, Metrics, SessionId};

use crate::error::{Error, Result};

/// Message the endpoint sends when a device has no samples in the window.
pub const NO_DATA_MESSAGE: &str = "No data found for the specified device.";

/// Raw response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryPayload {
    /// Informational message, e.g. [`NO_DATA_MESSAGE`].
    #[serde(default)]
    pub message: Option<String>,
    /// Heart rate per sample.
    #[serde(default)]
    pub hr: Option<Vec<Option<f64>>>,
    /// LF/HF ratio per sample.
    #[serde(default)]
    pub lf_hf_ratio: Option<Vec<Option<f64>>>,
    /// RMSSD per sample.
    #[serde(default)]
    pub rmssd: Option<Vec<Option<f64>>>,
    /// SDRR per sample.
    #[serde(default)]
    pub sdrr: Option<Vec<Option<f64>>>,
    /// Stress index per sample.
    #[serde(default)]
    pub si: Option<Vec<Option<f64>>>,
    /// Sample timestamps.
    #[serde(default)]
    pub time: Option<Vec<String>>,
}

/// Why a well-formed response carried no samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The endpoint's "no data found" sentinel.
    Sentinel,
    /// Every metric array was missing or empty.
    NoMetrics,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::Sentinel => write!(f, "no data found"),
            EmptyReason::NoMetrics => write!(f, "empty dataset"),
        }
    }
}

/// What a decoded payload means for the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// A successful response with nothing in it.
    Empty(EmptyReason),
    /// Samples in response order.
    Samples(Vec<Measurement>),
}

impl TelemetryPayload {
    /// Decode a response body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Whether this is the "no data found" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.message.as_deref() == Some(NO_DATA_MESSAGE)
    }

    fn metric_arrays(&self) -> [Option<&Vec<Option<f64>>>; 5] {
        [
            self.hr.as_ref(),
            self.lf_hf_ratio.as_ref(),
            self.rmssd.as_ref(),
            self.sdrr.as_ref(),
            self.si.as_ref(),
        ]
    }

    /// Turn the payload into samples for `device`.
    ///
    /// Fails if metrics are present but the `time` array is missing.
    pub fn interpret(self, device: &Device, session: Option<&SessionId>) -> Result<Interpretation> {
        if self.is_sentinel() {
            return Ok(Interpretation::Empty(EmptyReason::Sentinel));
        }

        let arrays = self.metric_arrays();
        if arrays.iter().all(|a| a.is_none_or(|v| v.is_empty())) {
            return Ok(Interpretation::Empty(EmptyReason::NoMetrics));
        }

        let times = self
            .time
            .as_ref()
            .ok_or_else(|| Error::Decode("metric arrays present without a time array".into()))?;

        let len = arrays
            .iter()
            .flatten()
            .map(|a| a.len())
            .fold(times.len(), usize::min);

        let at = |array: Option<&Vec<Option<f64>>>, i: usize| array.and_then(|a| a[i]);

        let samples = (0..len)
            .map(|i| {
                let metrics = Metrics {
                    hr: at(arrays[0], i),
                    lf_hf_ratio: at(arrays[1], i),
                    rmssd: at(arrays[2], i),
                    sdrr: at(arrays[3], i),
                    si: at(arrays[4], i),
                };
                Measurement::new(device, times[i].clone(), metrics).with_session(session.cloned())
            })
            .collect();

        Ok(Interpretation::Samples(samples))
    }
}
