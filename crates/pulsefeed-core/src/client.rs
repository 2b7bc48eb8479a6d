//! Transport abstraction for the telemetry endpoint.
//!
//! The pool only needs "send this request, give me the body back", which is
//! captured by [`TelemetryClient`]. [`HttpTelemetryClient`] is the production
//! implementation; [`MockTelemetryClient`](crate::mock::MockTelemetryClient)
//! stands in for it in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use time::UtcOffset;
use tracing::debug;

use pulsefeed_types::{DeviceId, SessionId, Window};

use crate::error::{Error, Result};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One request to the telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Device the request is for. Not sent on the wire.
    pub device_id: DeviceId,
    /// `device_name` parameter: `{session}_{address}` or the bare address.
    pub device_name: String,
    /// `start` parameter, `YYYY-MM-DD-HH-MM-SS`.
    pub start: String,
    /// `end` parameter, `YYYY-MM-DD-HH-MM-SS`.
    pub end: String,
}

impl FetchRequest {
    /// Build the request for `device_id` over `window`, rendering times in `offset`.
    pub fn new(
        device_id: &DeviceId,
        session: Option<&SessionId>,
        window: &Window,
        offset: UtcOffset,
    ) -> Result<Self> {
        let (start, end) = window.to_params(offset)?;
        let device_name = match session {
            Some(session) => format!("{}_{}", session, device_id),
            None => device_id.to_string(),
        };
        Ok(Self {
            device_id: device_id.clone(),
            device_name,
            start,
            end,
        })
    }

    /// Query parameters in the order the endpoint documents them.
    pub fn query(&self) -> [(&'static str, &str); 3] {
        [
            ("device_name", self.device_name.as_str()),
            ("start", self.start.as_str()),
            ("end", self.end.as_str()),
        ]
    }
}

/// Sends a [`FetchRequest`] and returns the raw response body.
///
/// Implementations report transport problems (connection errors, non-success
/// status) as errors and leave decoding to the caller.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Issue one request.
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes>;
}

/// HTTP implementation of [`TelemetryClient`].
#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: Client,
    url: String,
}

impl HttpTelemetryClient {
    /// Create a client for the endpoint at `url`.
    ///
    /// `timeout` bounds each request at the transport level; the pool applies
    /// its own timeout on top.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(url, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(url: &str, client: Client) -> Result<Self> {
        let url = url.trim().to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::invalid_config(format!(
                "URL must start with http:// or https://, got: {}",
                url
            )));
        }
        Ok(Self { client, url })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes> {
        let response = self
            .client
            .get(&self.url)
            .query(&request.query())
            .send()
            .await?;

        let status = response.status();
        debug!("{} -> HTTP {}", response.url(), status);
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                device_name: request.device_name.clone(),
            });
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn window() -> Window {
        Window::starting_at(datetime!(2025-05-15 13:23:00 UTC), Duration::from_secs(60)).unwrap()
    }

    fn id() -> DeviceId {
        DeviceId::parse("CE:D6:AD:45:ED:75").unwrap()
    }

    #[test]
    fn test_request_with_session() {
        let session = SessionId::parse("1330");
        let request = FetchRequest::new(&id(), Some(&session), &window(), offset!(+3)).unwrap();
        assert_eq!(request.device_name, "1330_CE:D6:AD:45:ED:75");
        assert_eq!(request.start, "2025-05-15-16-23-00");
        assert_eq!(request.end, "2025-05-15-16-24-00");
    }

    #[test]
    fn test_request_without_session() {
        let request = FetchRequest::new(&id(), None, &window(), offset!(UTC)).unwrap();
        assert_eq!(request.device_name, "CE:D6:AD:45:ED:75");
        assert_eq!(
            request.query(),
            [
                ("device_name", "CE:D6:AD:45:ED:75"),
                ("start", "2025-05-15-13-23-00"),
                ("end", "2025-05-15-13-24-00"),
            ]
        );
    }

    #[test]
    fn test_http_client_rejects_bad_scheme() {
        let result = HttpTelemetryClient::new("ftp://example.com", DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_http_client_accepts_http() {
        let client =
            HttpTelemetryClient::new(" http://127.0.0.1:30003/get_ppg_data ", DEFAULT_REQUEST_TIMEOUT)
                .unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:30003/get_ppg_data");
    }
}
