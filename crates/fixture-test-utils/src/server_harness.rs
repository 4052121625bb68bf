//! Test server harness standing in for the deployed mock backend.
//!
//! Provides `TestTelemetryServer`, an axum server that serves buffered
//! records on `/timeseries` and `/logentries` in the same envelopes the real
//! mock backend uses.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use telemetry_fixture::records::{
    ListLogEntriesResponse, ListTimeSeriesResponse, LogEntry, TimeSeries,
};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Buffers {
    time_series: Vec<TimeSeries>,
    log_entries: Vec<LogEntry>,
}

type SharedBuffers = Arc<Mutex<Buffers>>;

/// Mock telemetry backend served over real HTTP.
///
/// # Example
/// ```rust,ignore
/// let server = TestTelemetryServer::spawn().await?;
/// server.push_log_entry(fixtures::access_log_entry("r-1"));
///
/// let cluster = FakeCluster::new("primary").with_tunnel_address(server.address());
/// ```
pub struct TestTelemetryServer {
    addr: SocketAddr,
    buffers: SharedBuffers,
    _handle: JoinHandle<()>,
}

impl TestTelemetryServer {
    /// Spawn on a random local port.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let buffers = SharedBuffers::default();

        let app = Router::new()
            .route("/timeseries", get(list_time_series))
            .route("/logentries", get(list_log_entries))
            .with_state(buffers.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test telemetry server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            buffers,
            _handle: handle,
        })
    }

    /// `host:port` to hand to a tunnel.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn push_time_series(&self, series: TimeSeries) {
        self.buffers.lock().unwrap().time_series.push(series);
    }

    pub fn push_log_entry(&self, entry: LogEntry) {
        self.buffers.lock().unwrap().log_entries.push(entry);
    }

    /// Drop everything buffered so far.
    pub fn clear(&self) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.time_series.clear();
        buffers.log_entries.clear();
    }
}

impl Drop for TestTelemetryServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

async fn list_time_series(State(buffers): State<SharedBuffers>) -> Json<ListTimeSeriesResponse> {
    let time_series = buffers.lock().unwrap().time_series.clone();
    Json(ListTimeSeriesResponse {
        time_series,
        ..Default::default()
    })
}

async fn list_log_entries(State(buffers): State<SharedBuffers>) -> Json<ListLogEntriesResponse> {
    let entries = buffers.lock().unwrap().log_entries.clone();
    Json(ListLogEntriesResponse {
        entries,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use telemetry_fixture::TelemetryClient;

    #[tokio::test]
    async fn test_serves_buffered_records() {
        let server = TestTelemetryServer::spawn().await.unwrap();
        server.push_log_entry(fixtures::access_log_entry("r-1"));
        server.push_time_series(fixtures::request_count_series("200"));

        let client = TelemetryClient::new(&server.address()).unwrap();
        let entries = client.list_log_entries().await.unwrap();
        let series = client.list_time_series().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].log_name, fixtures::ACCESS_LOG_NAME);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric.as_ref().unwrap().labels["response_code"], "200");
    }

    #[tokio::test]
    async fn test_clear() {
        let server = TestTelemetryServer::spawn().await.unwrap();
        server.push_time_series(fixtures::request_count_series("200"));
        server.clear();

        let client = TelemetryClient::new(&server.address()).unwrap();
        assert!(client.list_time_series().await.unwrap().is_empty());
    }
}
