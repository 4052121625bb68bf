//! HTTP client for the mock backend's buffered telemetry.
//!
//! Both endpoints share one shape: GET, decode the list envelope, normalize
//! each record, return them in server order.

use crate::normalize::Normalize;
use crate::records::{ListLogEntriesResponse, ListTimeSeriesResponse, LogEntry, TimeSeries};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Hard deadline on every fetch, independent of any caller timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub const TIME_SERIES_PATH: &str = "/timeseries";
pub const LOG_ENTRIES_PATH: &str = "/logentries";

/// A failed fetch.
///
/// Callers should treat any `FetchError` as "fetch failed"; the cause is
/// available for display and through [`FetchError::is_timeout`].
#[derive(Debug, Error)]
#[error("Fetching {path} from mock telemetry backend failed: {kind}")]
pub struct FetchError {
    path: &'static str,
    kind: FetchErrorKind,
}

#[derive(Debug, Error)]
enum FetchErrorKind {
    #[error("HTTP request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Reading response body failed: {0}")]
    Body(reqwest::Error),

    #[error("Decoding response envelope failed: {0}")]
    Decode(serde_json::Error),
}

impl FetchError {
    /// Endpoint path the fetch was issued against.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// True when the request or body read hit the fetch deadline.
    pub fn is_timeout(&self) -> bool {
        match &self.kind {
            FetchErrorKind::Transport(e) | FetchErrorKind::Body(e) => e.is_timeout(),
            FetchErrorKind::Decode(_) => false,
        }
    }
}

/// Client for the mock backend behind a tunnel address.
#[derive(Clone)]
pub struct TelemetryClient {
    base_url: String,
    http_client: Client,
}

impl fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TelemetryClient {
    /// Create a client for `address` (`host:port`) with the fixed fetch deadline.
    pub fn new(address: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(address, FETCH_TIMEOUT)
    }

    pub(crate) fn with_timeout(address: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: format!("http://{address}"),
            http_client,
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and normalize the buffered metric time series.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn list_time_series(&self) -> Result<Vec<TimeSeries>, FetchError> {
        let envelope: ListTimeSeriesResponse = self.fetch_envelope(TIME_SERIES_PATH).await?;
        Ok(normalize_all(envelope.time_series))
    }

    /// Fetch and normalize the buffered log entries.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn list_log_entries(&self) -> Result<Vec<LogEntry>, FetchError> {
        let envelope: ListLogEntriesResponse = self.fetch_envelope(LOG_ENTRIES_PATH).await?;
        Ok(normalize_all(envelope.entries))
    }

    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        path: &'static str,
    ) -> Result<T, FetchError> {
        let fail = |kind| FetchError { path, kind };

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(FetchErrorKind::Transport(e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| fail(FetchErrorKind::Body(e)))?;

        debug!(target: "fixture.fetch", url = %url, status = %status, bytes = body.len(), "Fetched envelope");

        serde_json::from_slice(&body).map_err(|e| fail(FetchErrorKind::Decode(e)))
    }
}

fn normalize_all<T: Normalize>(records: Vec<T>) -> Vec<T> {
    records.into_iter().map(Normalize::normalized).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::records::LogSeverity;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(server: &MockServer) -> String {
        server.address().to_string()
    }

    #[test]
    fn test_fetch_timeout_is_five_seconds() {
        assert_eq!(FETCH_TIMEOUT, Duration::from_secs(5));
    }

    #[test]
    fn test_base_url_from_address() {
        let client = TelemetryClient::new("127.0.0.1:40123").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:40123");
    }

    #[tokio::test]
    async fn test_log_entries_are_normalized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logentries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [{
                    "logName": "server-accesslog",
                    "severity": "ERROR",
                    "timestamp": "2024-05-01T10:00:00Z",
                    "labels": {"request_id": "abc", "foo": "bar"},
                    "httpRequest": {"requestSize": "10", "remoteIp": "10.0.0.1"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&address(&server)).unwrap();
        let entries = client.list_log_entries().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].labels,
            HashMap::from([("foo".to_string(), "bar".to_string())])
        );
        assert_eq!(entries[0].severity, LogSeverity::Default);
        assert_eq!(entries[0].timestamp, None);
        let http = entries[0].http_request.as_ref().unwrap();
        assert_eq!(http.request_size, 0);
        assert!(http.remote_ip.is_empty());
    }

    #[tokio::test]
    async fn test_time_series_preserve_server_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeseries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timeSeries": [
                    {"metric": {"type": "m/first"}, "points": [{"value": {"int64Value": "1"}}]},
                    {"metric": {"type": "m/second"}, "resource": {"type": "k8s_pod"}}
                ],
                "unit": "1"
            })))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&address(&server)).unwrap();
        let series = client.list_time_series().await.unwrap();

        let types: Vec<&str> = series
            .iter()
            .map(|s| s.metric.as_ref().unwrap().metric_type.as_str())
            .collect();
        assert_eq!(types, vec!["m/first", "m/second"]);
        assert!(series.iter().all(|s| s.points.is_empty() && s.resource.is_none()));
    }

    #[tokio::test]
    async fn test_timeout_is_timeout_class() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeseries"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"timeSeries": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client =
            TelemetryClient::with_timeout(&address(&server), Duration::from_millis(200)).unwrap();
        let err = client.list_time_series().await.unwrap_err();

        assert!(err.is_timeout(), "expected timeout, got: {err}");
        assert_eq!(err.path(), "/timeseries");
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logentries"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&address(&server)).unwrap();
        let err = client.list_log_entries().await.unwrap_err();

        assert!(!err.is_timeout());
        assert!(err.to_string().contains("Decoding response envelope failed"));
    }

    #[tokio::test]
    async fn test_status_is_not_inspected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logentries"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(&address(&server)).unwrap();
        let entries = client.list_log_entries().await.unwrap();

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TelemetryClient::new(&addr.to_string()).unwrap();
        let err = client.list_time_series().await.unwrap_err();

        assert!(!err.is_timeout());
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
