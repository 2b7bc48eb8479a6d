//! The acquisition loop.
//!
//! [`CycleScheduler`] owns the fetch pool and both stores and drives one cycle
//! at a time:
//!
//! ```text
//! Idle -> ComputingWindow -> Dispatching -> Collecting -> Persisting -> Sleeping -> Idle
//! ```
//!
//! Cancellation is observed before each cycle and during the sleep. A cycle
//! that has started dispatching always runs to the end and persists.

use std::sync::Arc;
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pulsefeed_core::{
    CycleResult, FetchPool, HttpTelemetryClient, OutcomeKind, ResultAggregator, TelemetryClient,
    WindowCalculator,
};
use pulsefeed_store::{AppendOutcome, HistoryStore, Registry, SnapshotStore};
use pulsefeed_types::window::LOG_TIMESTAMP_FORMAT;
use pulsefeed_types::{Device, Window};

use crate::config::Config;
use crate::error::{Result, ServiceError};

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    ComputingWindow,
    Dispatching,
    Collecting,
    Persisting,
    Sleeping,
    ShuttingDown,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::ComputingWindow => "computing window",
            CycleState::Dispatching => "dispatching",
            CycleState::Collecting => "collecting",
            CycleState::Persisting => "persisting",
            CycleState::Sleeping => "sleeping",
            CycleState::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// What one cycle did.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    /// Window that was fetched.
    pub window: Window,
    /// Measurements appended to history.
    pub measurements: usize,
    /// Devices with an entry in the published snapshot.
    pub devices_with_data: usize,
    /// Devices that failed, panicked tasks included.
    pub failures: usize,
    /// Latest response time, or the window end if nobody responded.
    pub last_response_at: OffsetDateTime,
    /// No device got a response.
    pub server_unresponsive: bool,
    /// History was written to disk.
    pub history_persisted: bool,
    /// Snapshot was written to disk.
    pub snapshot_persisted: bool,
}

/// Drives acquisition cycles.
pub struct CycleScheduler {
    windows: WindowCalculator,
    pool: FetchPool,
    aggregator: ResultAggregator,
    devices: Vec<Device>,
    history: HistoryStore,
    snapshot: SnapshotStore,
    interval: Duration,
    offset: UtcOffset,
    state: CycleState,
    cycles: u64,
}

impl CycleScheduler {
    /// Assemble a scheduler from its parts.
    pub fn new(
        windows: WindowCalculator,
        pool: FetchPool,
        devices: Vec<Device>,
        history: HistoryStore,
        snapshot: SnapshotStore,
    ) -> Self {
        Self {
            windows,
            pool,
            aggregator: ResultAggregator::new(),
            devices,
            history,
            snapshot,
            interval: Duration::from_secs(5),
            offset: UtcOffset::UTC,
            state: CycleState::Idle,
            cycles: 0,
        }
    }

    /// Sleep between cycles.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Offset used when logging times.
    #[must_use]
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Build a scheduler from configuration with the HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpTelemetryClient::new(&config.api.url, config.api.request_timeout())?;
        Self::from_config_with_client(config, Arc::new(client))
    }

    /// Build a scheduler from configuration with a custom client.
    ///
    /// Loads the registry and the history. Fails if either cannot be read,
    /// if the history is corrupt, or if no device is enabled.
    pub fn from_config_with_client(
        config: &Config,
        client: Arc<dyn TelemetryClient>,
    ) -> Result<Self> {
        config.validate()?;
        let paths = config.storage.paths();

        let registry = Registry::load(&paths.registry)?;
        let devices: Vec<Device> = registry.enabled().cloned().collect();
        if devices.is_empty() {
            return Err(ServiceError::NoEnabledDevices(paths.registry));
        }

        let history = HistoryStore::open(&paths.history)?;
        let snapshot = SnapshotStore::new(&paths.snapshot);
        let windows = config.window_calculator()?;
        let pool_config = config.pool_config()?;
        let offset = pool_config.utc_offset;
        let pool = FetchPool::new(client, pool_config, devices.len())?;

        if let Some(seed) = config.fixed_start()? {
            info!("Fixed-advance windows from {}", format_time(seed, offset));
        }

        Ok(Self::new(windows, pool, devices, history, snapshot)
            .with_interval(config.window.interval())
            .with_offset(offset))
    }

    /// Current state.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Cycles completed.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Devices polled each cycle.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// The measurement history.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The snapshot store.
    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// The fetch pool.
    pub fn pool(&self) -> &FetchPool {
        &self.pool
    }

    /// Per-device outcome counts.
    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub(crate) fn set_state(&mut self, state: CycleState) {
        debug!("Scheduler: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Run one cycle with `now` as the wall-clock reference.
    ///
    /// Persistence failures are logged and do not fail the cycle.
    pub async fn run_cycle(&mut self, now: OffsetDateTime) -> Result<CycleSummary> {
        self.set_state(CycleState::ComputingWindow);
        let window = self.windows.next_window(now)?;
        info!(
            "Cycle {} for {} device(s): {}",
            self.cycles + 1,
            self.devices.len(),
            self.describe(window)
        );

        self.set_state(CycleState::Dispatching);
        let dispatch = self.pool.dispatch(window, &self.devices)?;

        self.set_state(CycleState::Collecting);
        let result = self.aggregator.aggregate(dispatch).await;

        self.set_state(CycleState::Persisting);
        let summary = self.persist(result);

        self.cycles += 1;
        self.set_state(CycleState::Idle);
        Ok(summary)
    }

    fn persist(&mut self, result: CycleResult) -> CycleSummary {
        let failures = result.failures();
        let empty = result.count(OutcomeKind::Empty);
        let CycleResult {
            window,
            measurements,
            latest,
            last_response_at,
            server_unresponsive,
            ..
        } = result;
        let count = measurements.len();

        let history_persisted = match self.history.append(measurements) {
            Ok(AppendOutcome::Persisted { added, total }) => {
                info!("Added {} record(s) to history ({} total)", added, total);
                true
            }
            Ok(AppendOutcome::Skipped) => {
                warn!("No new measurements for {}", self.describe(window));
                false
            }
            Err(e) => {
                error!("Failed to write history: {}", e);
                false
            }
        };

        let snapshot_persisted = match self.snapshot.publish(&latest) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write snapshot: {}", e);
                false
            }
        };

        if server_unresponsive {
            warn!("Server did not respond for {}", self.describe(window));
        }
        info!(
            "Cycle complete: {} record(s), {} device(s) with data, {} empty, {} failed, last response {}",
            count,
            latest.len(),
            empty,
            failures,
            format_time(last_response_at, self.offset)
        );

        CycleSummary {
            window,
            measurements: count,
            devices_with_data: latest.len(),
            failures,
            last_response_at,
            server_unresponsive,
            history_persisted,
            snapshot_persisted,
        }
    }

    /// Run cycles until `token` is cancelled.
    ///
    /// Returns the number of cycles completed during this call. An error
    /// means the loop could not continue, e.g. the fixed-advance window ran
    /// past the representable range.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<u64> {
        let start = self.cycles;

        loop {
            if token.is_cancelled() {
                break;
            }

            self.run_cycle(OffsetDateTime::now_utc()).await?;

            self.set_state(CycleState::Sleeping);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.set_state(CycleState::Idle);
        }

        info!("Stopping after {} cycle(s)", self.cycles - start);
        self.set_state(CycleState::ShuttingDown);
        Ok(self.cycles - start)
    }

    fn describe(&self, window: Window) -> String {
        format!(
            "[{} .. {})",
            format_time(window.start(), self.offset),
            format_time(window.end(), self.offset)
        )
    }
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("devices", &self.devices.len())
            .field("pool", &self.pool)
            .finish()
    }
}

fn format_time(t: OffsetDateTime, offset: UtcOffset) -> String {
    t.to_offset(offset)
        .format(LOG_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| t.to_string())
}
