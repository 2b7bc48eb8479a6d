//! Windowed telemetry collector for wearable device fleets.
//!
//! This crate provides the `pulsefeed` service that:
//! - Polls the telemetry endpoint once per cycle for every enabled bracelet
//! - Appends the collected measurements to the history file
//! - Publishes the latest value per device to the snapshot file
//! - Backs up all files on shutdown or fatal error
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/pulsefeed/pulsefeed.toml`:
//!
//! ```toml
//! [api]
//! url = "http://127.0.0.1:30003/get_ppg_data"
//! request_timeout_secs = 10
//! utc_offset = "+03:00"
//! session = "1330"
//!
//! [window]
//! fetch_duration_secs = 60
//! interval_secs = 5
//! # Replay from a fixed instant instead of following the clock
//! # fixed_start = "2025-05-15-16-23-00"
//!
//! [pool]
//! max_workers = 6
//!
//! [storage]
//! data_dir = "~/.local/share/pulsefeed"
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod shutdown;

pub use config::{
    ApiConfig, Config, ConfigError, PoolSettings, StorageConfig, ValidationError, WindowConfig,
    default_config_path,
};
pub use error::{Result, ServiceError};
pub use logging::log_filter;
pub use scheduler::{CycleScheduler, CycleState, CycleSummary};
pub use shutdown::{ExitStatus, ShutdownCoordinator};
