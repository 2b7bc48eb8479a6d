//! Telemetry acquisition for wearable device fleets.
//!
//! This crate implements the acquisition half of a pulsefeed cycle: working
//! out which time window to ask for, fanning one request per device out to the
//! telemetry endpoint under a concurrency cap, and folding the per-device
//! outcomes into a single cycle result.
//!
//! # Features
//!
//! - **Window calculation**: relative-to-now or fixed-advance (backfill) windows
//! - **Bounded fan-out**: one task per device, at most `max_workers` in flight
//! - **Failure isolation**: timeouts, HTTP errors and malformed bodies affect
//!   only the device that produced them
//! - **Completion-order aggregation**: fast devices are processed while slow
//!   ones are still in flight
//! - **Mock endpoint**: [`MockTelemetryClient`] for tests
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pulsefeed_core::{FetchPool, HttpTelemetryClient, PoolConfig, ResultAggregator, WindowCalculator};
//! use pulsefeed_types::{Device, DeviceId};
//! use time::OffsetDateTime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpTelemetryClient::new("http://127.0.0.1:30003/get_ppg_data", Duration::from_secs(10))?;
//!     let devices = vec![Device::new(DeviceId::parse("ce-d6-ad-45-ed-75")?, "swaid 1330")];
//!
//!     let pool = FetchPool::new(Arc::new(client), PoolConfig::default(), devices.len())?;
//!     let mut windows = WindowCalculator::relative(Duration::from_secs(60))?;
//!     let mut aggregator = ResultAggregator::new();
//!
//!     let window = windows.next_window(OffsetDateTime::now_utc())?;
//!     let result = aggregator.aggregate(pool.dispatch(window, &devices)?).await;
//!     println!("{} measurement(s)", result.measurements.len());
//!
//!     pool.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod client;
pub mod error;
pub mod mock;
pub mod pool;
pub mod response;
pub mod window;

// Re-export the shared data model
pub use pulsefeed_types::{Device, DeviceId, Measurement, Metrics, SessionId, Window};

pub use aggregator::{CycleResult, DeviceSummary, OutcomeTally, ResultAggregator};
pub use client::{DEFAULT_REQUEST_TIMEOUT, FetchRequest, HttpTelemetryClient, TelemetryClient};
pub use error::{Error, Result};
pub use mock::{MockResponse, MockTelemetryClient, MockTelemetryClientBuilder};
pub use pool::{
    DEFAULT_MAX_WORKERS, DeviceReport, Dispatch, FetchOutcome, FetchPool, OutcomeKind, PoolConfig,
};
pub use response::{EmptyReason, Interpretation, NO_DATA_MESSAGE, TelemetryPayload};
pub use window::{WindowCalculator, WindowMode};
