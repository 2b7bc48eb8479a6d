//! Completion-order aggregation of a dispatch into a cycle result.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use pulsefeed_types::{DeviceId, Measurement, Window};

use crate::pool::{DeviceReport, Dispatch, FetchOutcome, OutcomeKind};

/// Per-device outcome of one cycle, without the measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    /// The device.
    pub device_id: DeviceId,
    /// Human-readable label, `name [XX:YY]`.
    pub label: String,
    /// What happened.
    pub kind: OutcomeKind,
    /// Measurements contributed.
    pub count: usize,
    /// Failure or empty reason.
    pub detail: Option<String>,
    /// When the request was sent.
    pub requested_at: OffsetDateTime,
    /// When a response arrived, if one did.
    pub responded_at: Option<OffsetDateTime>,
}

/// Everything one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// The window that was fetched.
    pub window: Window,
    /// All measurements, grouped by device in completion order.
    pub measurements: Vec<Measurement>,
    /// Last measurement of each device that produced data.
    pub latest: BTreeMap<DeviceId, Measurement>,
    /// One summary per completed task, in completion order.
    pub reports: Vec<DeviceSummary>,
    /// Latest response time, or the window end if nobody responded.
    pub last_response_at: OffsetDateTime,
    /// No device got a response this cycle.
    pub server_unresponsive: bool,
    /// Tasks that panicked instead of reporting.
    pub failed_tasks: usize,
}

impl CycleResult {
    /// Number of reports of the given kind.
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.reports.iter().filter(|r| r.kind == kind).count()
    }

    /// Number of failed devices, panicked tasks included.
    pub fn failures(&self) -> usize {
        self.reports.iter().filter(|r| r.kind.is_failure()).count() + self.failed_tasks
    }
}

/// Running per-device outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    /// Cycles that returned measurements.
    pub success: u64,
    /// Cycles answered with no data.
    pub empty: u64,
    /// Timeouts and connection or HTTP errors.
    pub transport_failure: u64,
    /// Bodies that could not be decoded.
    pub decode_failure: u64,
    /// Measurements received.
    pub measurements: u64,
}

impl OutcomeTally {
    fn record(&mut self, kind: OutcomeKind, count: usize) {
        match kind {
            OutcomeKind::Success => self.success += 1,
            OutcomeKind::Empty => self.empty += 1,
            OutcomeKind::TransportFailure => self.transport_failure += 1,
            OutcomeKind::DecodeFailure => self.decode_failure += 1,
        }
        self.measurements += count as u64;
    }

    /// Total failures.
    pub fn failures(&self) -> u64 {
        self.transport_failure + self.decode_failure
    }
}

/// Folds dispatches into [`CycleResult`]s and keeps per-device counts across
/// cycles.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    tallies: BTreeMap<DeviceId, (String, OutcomeTally)>,
    panicked: u64,
    cycles: u64,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cycles aggregated.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Counts for one device.
    pub fn tally(&self, id: &DeviceId) -> Option<OutcomeTally> {
        self.tallies.get(id).map(|(_, t)| *t)
    }

    /// Counts for every device seen, keyed by id.
    pub fn tallies(&self) -> impl Iterator<Item = (&DeviceId, &str, &OutcomeTally)> {
        self.tallies.iter().map(|(id, (label, t))| (id, label.as_str(), t))
    }

    /// Wait for every task in `dispatch` and fold the results.
    ///
    /// Reports are consumed as they complete, so a slow device never holds up
    /// processing of the fast ones, but the call only returns once every
    /// dispatched task has finished.
    pub async fn aggregate(&mut self, mut dispatch: Dispatch) -> CycleResult {
        let window = dispatch.window();
        let mut measurements = Vec::new();
        let mut latest = BTreeMap::new();
        let mut reports = Vec::with_capacity(dispatch.dispatched());
        let mut last_response_at: Option<OffsetDateTime> = None;
        let mut failed_tasks = 0;

        while let Some(joined) = dispatch.next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    error!("Fetch task failed for {}: {}", window, e);
                    failed_tasks += 1;
                    continue;
                }
            };

            if let Some(at) = report.responded_at {
                last_response_at = Some(last_response_at.map_or(at, |prev| prev.max(at)));
            }

            let summary = self.fold(report, window, &mut measurements, &mut latest);
            reports.push(summary);
        }

        self.panicked += failed_tasks as u64;
        self.cycles += 1;

        let server_unresponsive = last_response_at.is_none();
        CycleResult {
            window,
            measurements,
            latest,
            reports,
            last_response_at: last_response_at.unwrap_or(window.end()),
            server_unresponsive,
            failed_tasks,
        }
    }

    fn fold(
        &mut self,
        report: DeviceReport,
        window: Window,
        measurements: &mut Vec<Measurement>,
        latest: &mut BTreeMap<DeviceId, Measurement>,
    ) -> DeviceSummary {
        let DeviceReport {
            device,
            requested_at,
            responded_at,
            outcome,
        } = report;
        let label = device.label();
        let kind = outcome.kind();

        let (count, detail) = match outcome {
            FetchOutcome::Success(batch) => {
                info!("[{}] {} measurement(s) for {}", label, batch.len(), window);
                if let Some(last) = batch.last() {
                    latest.insert(device.id.clone(), last.clone());
                }
                let count = batch.len();
                measurements.extend(batch);
                (count, None)
            }
            FetchOutcome::Empty(reason) => {
                debug!("[{}] {} for {}", label, reason, window);
                (0, Some(reason.to_string()))
            }
            FetchOutcome::TransportFailure(reason) => {
                warn!("[{}] Request failed for {}: {}", label, window, reason);
                (0, Some(reason))
            }
            FetchOutcome::DecodeFailure(reason) => {
                warn!("[{}] Bad response for {}: {}", label, window, reason);
                (0, Some(reason))
            }
        };

        self.tallies
            .entry(device.id.clone())
            .or_insert_with(|| (label.clone(), OutcomeTally::default()))
            .1
            .record(kind, count);

        DeviceSummary {
            device_id: device.id,
            label,
            kind,
            count,
            detail,
            requested_at,
            responded_at,
        }
    }

    /// Log the per-device counts.
    pub fn log_tallies(&self) {
        info!("Outcome summary over {} cycle(s):", self.cycles);
        for (_, label, t) in self.tallies() {
            info!(
                "  {}: {} ok, {} empty, {} failed, {} measurement(s)",
                label,
                t.success,
                t.empty,
                t.failures(),
                t.measurements
            );
        }
        if self.panicked > 0 {
            warn!("  {} fetch task(s) panicked", self.panicked);
        }
    }
}
