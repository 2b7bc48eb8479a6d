//! Bounded-concurrency fetch pool.
//!
//! [`FetchPool`] lives for the whole process. Each [`FetchPool::dispatch`]
//! spawns one task per enabled device onto a shared [`TaskTracker`]; a
//! semaphore caps how many of them talk to the endpoint at once. The returned
//! [`Dispatch`] yields [`DeviceReport`]s in completion order.
//!
//! A failure in one task never affects the others: every error is folded into
//! that device's [`FetchOutcome`].
//!
//! [`FetchPool::shutdown`] stops accepting new dispatches and waits for tasks
//! already running. Each task is bounded by the request timeout, so the drain
//! is bounded too.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use pulsefeed_types::{Device, Measurement, SessionId, Window};

use crate::client::{DEFAULT_REQUEST_TIMEOUT, FetchRequest, TelemetryClient};
use crate::error::{Error, Result};
use crate::response::{EmptyReason, Interpretation, TelemetryPayload};

/// Default cap on concurrent fetches.
pub const DEFAULT_MAX_WORKERS: usize = 6;

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on concurrent fetches.
    pub max_workers: usize,
    /// Timeout applied to each request.
    pub request_timeout: Duration,
    /// Offset used to render window bounds.
    pub utc_offset: UtcOffset,
    /// Session the run collects under, if any.
    pub session: Option<SessionId>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            utc_offset: UtcOffset::UTC,
            session: None,
        }
    }
}

/// Result of one device's fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Samples in response order.
    Success(Vec<Measurement>),
    /// A well-formed response without samples.
    Empty(EmptyReason),
    /// The request did not complete or the endpoint rejected it.
    TransportFailure(String),
    /// The response body could not be interpreted.
    DecodeFailure(String),
}

impl FetchOutcome {
    /// The outcome's kind, without payload.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            FetchOutcome::Success(_) => OutcomeKind::Success,
            FetchOutcome::Empty(_) => OutcomeKind::Empty,
            FetchOutcome::TransportFailure(_) => OutcomeKind::TransportFailure,
            FetchOutcome::DecodeFailure(_) => OutcomeKind::DecodeFailure,
        }
    }

    /// Samples carried by the outcome.
    pub fn measurements(&self) -> &[Measurement] {
        match self {
            FetchOutcome::Success(m) => m,
            _ => &[],
        }
    }
}

/// Kind of a [`FetchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Samples were returned.
    Success,
    /// No samples, not an error.
    Empty,
    /// Network, status or timeout failure.
    TransportFailure,
    /// Malformed response.
    DecodeFailure,
}

impl OutcomeKind {
    /// Whether this kind is a failure.
    pub fn is_failure(self) -> bool {
        matches!(self, OutcomeKind::TransportFailure | OutcomeKind::DecodeFailure)
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::Empty => write!(f, "empty"),
            OutcomeKind::TransportFailure => write!(f, "transport failure"),
            OutcomeKind::DecodeFailure => write!(f, "decode failure"),
        }
    }
}

/// Outcome of one device's fetch with timing metadata.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    /// The device.
    pub device: Device,
    /// When the request was sent.
    pub requested_at: OffsetDateTime,
    /// When a response arrived, if one did.
    pub responded_at: Option<OffsetDateTime>,
    /// What happened.
    pub outcome: FetchOutcome,
}

/// The in-flight fetches of one dispatch.
pub struct Dispatch {
    window: Window,
    tasks: FuturesUnordered<JoinHandle<DeviceReport>>,
    dispatched: usize,
}

impl Dispatch {
    /// The window being fetched.
    pub fn window(&self) -> Window {
        self.window
    }

    /// Number of tasks spawned.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Next report to complete, or `None` once every task has finished.
    ///
    /// A task that panicked yields `Some(Err(_))`.
    pub async fn next(&mut self) -> Option<std::result::Result<DeviceReport, JoinError>> {
        self.tasks.next().await
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("window", &self.window)
            .field("dispatched", &self.dispatched)
            .field("pending", &self.tasks.len())
            .finish()
    }
}

/// Long-lived executor for per-device fetches.
pub struct FetchPool {
    client: Arc<dyn TelemetryClient>,
    permits: Arc<Semaphore>,
    workers: usize,
    tracker: TaskTracker,
    config: PoolConfig,
}

impl FetchPool {
    /// Create a pool sized for `device_count` devices.
    ///
    /// The concurrency cap is `min(device_count, max_workers)`, at least one.
    pub fn new(
        client: Arc<dyn TelemetryClient>,
        config: PoolConfig,
        device_count: usize,
    ) -> Result<Self> {
        if config.max_workers == 0 {
            return Err(Error::invalid_config("max_workers must be at least 1"));
        }
        if config.request_timeout.is_zero() {
            return Err(Error::invalid_config("request timeout must be non-zero"));
        }

        let workers = device_count.min(config.max_workers).max(1);
        info!("Fetch pool: {} worker(s)", workers);

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            tracker: TaskTracker::new(),
            config,
        })
    }

    /// Concurrency cap.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of fetch tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Spawn one fetch per enabled device.
    pub fn dispatch(&self, window: Window, devices: &[Device]) -> Result<Dispatch> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let tasks = FuturesUnordered::new();
        for device in devices.iter().filter(|d| d.enabled) {
            let job = FetchJob {
                client: Arc::clone(&self.client),
                device: device.clone(),
                window,
                timeout: self.config.request_timeout,
                offset: self.config.utc_offset,
                session: self.config.session.clone(),
            };
            let permits = Arc::clone(&self.permits);
            tasks.push(self.tracker.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                job.run().await
            }));
        }

        let dispatched = tasks.len();
        debug!("Dispatched {} fetch(es) for {}", dispatched, window);

        Ok(Dispatch {
            window,
            tasks,
            dispatched,
        })
    }

    /// Stop accepting work and wait for in-flight fetches.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!("Waiting for {} in-flight fetch(es)", pending);
        }
        self.tracker.wait().await;
        info!("Fetch pool drained");
    }
}

impl std::fmt::Debug for FetchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPool")
            .field("workers", &self.workers)
            .field("in_flight", &self.tracker.len())
            .field("closed", &self.tracker.is_closed())
            .finish()
    }
}

struct FetchJob {
    client: Arc<dyn TelemetryClient>,
    device: Device,
    window: Window,
    timeout: Duration,
    offset: UtcOffset,
    session: Option<SessionId>,
}

impl FetchJob {
    async fn run(self) -> DeviceReport {
        let requested_at = OffsetDateTime::now_utc();
        let (responded_at, outcome) = self.fetch().await;
        DeviceReport {
            device: self.device,
            requested_at,
            responded_at,
            outcome,
        }
    }

    async fn fetch(&self) -> (Option<OffsetDateTime>, FetchOutcome) {
        let label = self.device.label();
        let request =
            match FetchRequest::new(&self.device.id, self.session.as_ref(), &self.window, self.offset)
            {
                Ok(r) => r,
                Err(e) => return (None, FetchOutcome::TransportFailure(e.to_string())),
            };

        debug!(
            "[{}] GET device_name={} start={} end={}",
            label, request.device_name, request.start, request.end
        );

        let body = match tokio::time::timeout(self.timeout, self.client.fetch(&request)).await {
            Err(_) => {
                let err = Error::timeout(format!("fetch {}", self.device.id), self.timeout);
                return (None, FetchOutcome::TransportFailure(err.to_string()));
            }
            Ok(Err(e)) => {
                let responded_at = e.server_responded().then(OffsetDateTime::now_utc);
                return (responded_at, FetchOutcome::TransportFailure(e.to_string()));
            }
            Ok(Ok(body)) => body,
        };
        let responded_at = Some(OffsetDateTime::now_utc());

        let outcome = match TelemetryPayload::decode(&body)
            .and_then(|p| p.interpret(&self.device, self.session.as_ref()))
        {
            Ok(Interpretation::Samples(samples)) if samples.is_empty() => {
                FetchOutcome::Empty(EmptyReason::NoMetrics)
            }
            Ok(Interpretation::Samples(samples)) => FetchOutcome::Success(samples),
            Ok(Interpretation::Empty(reason)) => FetchOutcome::Empty(reason),
            Err(e) => FetchOutcome::DecodeFailure(e.to_string()),
        };

        (responded_at, outcome)
    }
}
