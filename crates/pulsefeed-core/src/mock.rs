//! Mock telemetry endpoint for testing.
//!
//! [`MockTelemetryClient`] implements [`TelemetryClient`] without any network
//! access, so the pool, aggregator and scheduler can be driven end to end in
//! tests.
//!
//! # Features
//!
//! - **Per-device responses**: samples, the "no data" sentinel, raw bodies,
//!   HTTP status errors or connection failures
//! - **Latency simulation**: per-device delays via `tokio::time::sleep`, which
//!   cooperates with paused test time
//! - **Request log**: every request is recorded for assertions

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use pulsefeed_types::DeviceId;

use crate::client::{FetchRequest, TelemetryClient};
use crate::error::{Error, Result};
use crate::response::NO_DATA_MESSAGE;

/// Canned response for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// `n` samples with every metric populated.
    Samples(usize),
    /// The "no data found" sentinel.
    NoData,
    /// A raw response body, sent with HTTP 200.
    Body(String),
    /// A non-success HTTP status.
    Status(u16),
    /// A failure before any response.
    Fail(String),
}

impl MockResponse {
    /// `n` samples.
    pub fn samples(n: usize) -> Self {
        MockResponse::Samples(n)
    }

    /// A raw body.
    pub fn body(body: impl Into<String>) -> Self {
        MockResponse::Body(body.into())
    }

    fn render(&self, request: &FetchRequest) -> Result<Bytes> {
        match self {
            MockResponse::Samples(n) => {
                let n = *n;
                let series = |base: f64| (0..n).map(|i| base + i as f64).collect::<Vec<_>>();
                let time: Vec<String> = (0..n).map(|i| format!("{}#{}", request.start, i)).collect();
                let body = serde_json::json!({
                    "hr": series(70.0),
                    "lf_hf_ratio": series(1.0),
                    "rmssd": series(40.0),
                    "sdrr": series(50.0),
                    "si": series(100.0),
                    "time": time,
                });
                Ok(Bytes::from(body.to_string()))
            }
            MockResponse::NoData => {
                let body = serde_json::json!({ "message": NO_DATA_MESSAGE });
                Ok(Bytes::from(body.to_string()))
            }
            MockResponse::Body(body) => Ok(Bytes::from(body.clone())),
            MockResponse::Status(status) => Err(Error::Status {
                status: *status,
                device_name: request.device_name.clone(),
            }),
            MockResponse::Fail(message) => Err(Error::Connection(message.clone())),
        }
    }
}

/// In-memory stand-in for the telemetry endpoint.
///
/// Devices without a configured response get [`MockResponse::NoData`].
///
/// # Example
///
/// ```
/// use pulsefeed_core::{FetchRequest, MockResponse, MockTelemetryClient, TelemetryClient};
/// use pulsefeed_types::{DeviceId, Window};
/// use std::time::Duration;
/// use time::macros::{datetime, offset};
///
/// #[tokio::main]
/// async fn main() {
///     let id = DeviceId::parse("CE:D6:AD:45:ED:75").unwrap();
///     let client = MockTelemetryClient::new();
///     client.set_response(&id, MockResponse::samples(3)).await;
///
///     let window = Window::starting_at(datetime!(2025-05-15 13:23:00 UTC), Duration::from_secs(60)).unwrap();
///     let request = FetchRequest::new(&id, None, &window, offset!(+3)).unwrap();
///     let body = client.fetch(&request).await.unwrap();
///     assert!(!body.is_empty());
///     assert_eq!(client.request_count(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockTelemetryClient {
    responses: RwLock<HashMap<DeviceId, MockResponse>>,
    latencies: RwLock<HashMap<DeviceId, Duration>>,
    requests: RwLock<Vec<FetchRequest>>,
    request_count: AtomicUsize,
    completed_count: AtomicUsize,
    in_flight: AtomicUsize,
    /// Highest number of requests observed in flight at once.
    pub max_concurrent: AtomicUsize,
}

impl MockTelemetryClient {
    /// Create a mock with no configured responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a mock.
    pub fn builder() -> MockTelemetryClientBuilder {
        MockTelemetryClientBuilder::default()
    }

    /// Set the response for a device.
    pub async fn set_response(&self, id: &DeviceId, response: MockResponse) {
        self.responses.write().await.insert(id.clone(), response);
    }

    /// Set the simulated latency for a device.
    pub async fn set_latency(&self, id: &DeviceId, latency: Duration) {
        self.latencies.write().await.insert(id.clone(), latency);
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of requests that ran to completion (not cancelled by a timeout).
    pub fn completed_count(&self) -> usize {
        self.completed_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.read().await.clone()
    }

    /// Requests received for one device.
    pub async fn requests_for(&self, id: &DeviceId) -> Vec<FetchRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| &r.device_id == id)
            .cloned()
            .collect()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelemetryClient for MockTelemetryClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let latency = self.latencies.read().await.get(&request.device_id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let response = self
            .responses
            .read()
            .await
            .get(&request.device_id)
            .cloned()
            .unwrap_or(MockResponse::NoData);

        self.completed_count.fetch_add(1, Ordering::SeqCst);
        response.render(request)
    }
}

/// Builder for [`MockTelemetryClient`].
#[derive(Debug, Default)]
pub struct MockTelemetryClientBuilder {
    responses: HashMap<DeviceId, MockResponse>,
    latencies: HashMap<DeviceId, Duration>,
}

impl MockTelemetryClientBuilder {
    /// Set the response for a device.
    #[must_use]
    pub fn response(mut self, id: &DeviceId, response: MockResponse) -> Self {
        self.responses.insert(id.clone(), response);
        self
    }

    /// Set the latency for a device.
    #[must_use]
    pub fn latency(mut self, id: &DeviceId, latency: Duration) -> Self {
        self.latencies.insert(id.clone(), latency);
        self
    }

    /// Build the mock.
    pub fn build(self) -> MockTelemetryClient {
        MockTelemetryClient {
            responses: RwLock::new(self.responses),
            latencies: RwLock::new(self.latencies),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Interpretation, TelemetryPayload};
    use pulsefeed_types::{Device, Window};
    use time::macros::{datetime, offset};

    fn id() -> DeviceId {
        DeviceId::parse("CE:D6:AD:45:ED:75").unwrap()
    }

    fn request() -> FetchRequest {
        let window =
            Window::starting_at(datetime!(2025-05-15 13:23:00 UTC), Duration::from_secs(60))
                .unwrap();
        FetchRequest::new(&id(), None, &window, offset!(+3)).unwrap()
    }

    #[tokio::test]
    async fn test_default_response_is_sentinel() {
        let client = MockTelemetryClient::new();
        let body = client.fetch(&request()).await.unwrap();
        assert!(TelemetryPayload::decode(&body).unwrap().is_sentinel());
    }

    #[tokio::test]
    async fn test_samples_decode() {
        let client = MockTelemetryClient::builder()
            .response(&id(), MockResponse::samples(3))
            .build();
        let body = client.fetch(&request()).await.unwrap();
        let device = Device::new(id(), "band");
        let Interpretation::Samples(samples) =
            TelemetryPayload::decode(&body).unwrap().interpret(&device, None).unwrap()
        else {
            panic!("expected samples");
        };
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].metrics.hr, Some(72.0));
        assert_eq!(samples[0].timestamp, "2025-05-15-16-23-00#0");
    }

    #[tokio::test]
    async fn test_failures() {
        let client = MockTelemetryClient::new();
        client.set_response(&id(), MockResponse::Status(500)).await;
        assert!(matches!(
            client.fetch(&request()).await,
            Err(Error::Status { status: 500, .. })
        ));

        client
            .set_response(&id(), MockResponse::Fail("refused".into()))
            .await;
        assert!(matches!(
            client.fetch(&request()).await,
            Err(Error::Connection(_))
        ));
        assert_eq!(client.request_count(), 2);
        assert_eq!(client.requests_for(&id()).await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let client = MockTelemetryClient::builder()
            .latency(&id(), Duration::from_secs(3))
            .build();
        let start = tokio::time::Instant::now();
        client.fetch(&request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(client.max_concurrent.load(Ordering::SeqCst), 1);
    }
}
