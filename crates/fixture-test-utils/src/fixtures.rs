//! Record builders shaped like what a mesh proxy reports.
//!
//! Builders set the nondeterministic fields (timestamps, sizes, IPs, latency,
//! request ids) so tests can check that normalization clears them.

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use telemetry_fixture::records::{
    HttpRequest, LogEntry, LogSeverity, Metric, MonitoredResource, Point, TimeInterval,
    TimeSeries, TypedValue,
};

pub const ACCESS_LOG_NAME: &str = "server-accesslog-stackdriver";
pub const REQUEST_COUNT_METRIC: &str = "istio.io/service/server/request_count";

fn container_resource() -> MonitoredResource {
    MonitoredResource {
        resource_type: "k8s_container".to_string(),
        labels: HashMap::from([
            ("pod_name".to_string(), "server-v1-6d4f9".to_string()),
            ("namespace_name".to_string(), "echo-1".to_string()),
        ]),
    }
}

/// Server request count series with one cumulative point.
pub fn request_count_series(response_code: &str) -> TimeSeries {
    TimeSeries {
        metric: Some(Metric {
            metric_type: REQUEST_COUNT_METRIC.to_string(),
            labels: HashMap::from([
                ("response_code".to_string(), response_code.to_string()),
                ("request_protocol".to_string(), "http".to_string()),
            ]),
        }),
        resource: Some(container_resource()),
        metric_kind: "CUMULATIVE".to_string(),
        value_type: "INT64".to_string(),
        points: vec![Point {
            interval: Some(TimeInterval {
                start_time: Utc.timestamp_opt(1_714_557_600, 0).single(),
                end_time: Utc.timestamp_opt(1_714_557_660, 0).single(),
            }),
            value: Some(TypedValue {
                int64_value: Some(17),
                ..Default::default()
            }),
        }],
        ..Default::default()
    }
}

/// Access log entry carrying every field normalization is expected to clear.
pub fn access_log_entry(request_id: &str) -> LogEntry {
    LogEntry {
        log_name: ACCESS_LOG_NAME.to_string(),
        resource: Some(container_resource()),
        timestamp: Utc.timestamp_opt(1_714_557_601, 250_000_000).single(),
        severity: LogSeverity::Info,
        http_request: Some(HttpRequest {
            request_method: "GET".to_string(),
            request_url: "http://server.echo-1.svc:8080/echo".to_string(),
            request_size: 512,
            status: 200,
            response_size: 2048,
            user_agent: "curl/8.5".to_string(),
            remote_ip: "10.8.0.4:41230".to_string(),
            server_ip: "10.8.1.7:8080".to_string(),
            latency: Some("0.004s".to_string()),
            protocol: "http".to_string(),
            ..Default::default()
        }),
        labels: HashMap::from([
            ("request_id".to_string(), request_id.to_string()),
            ("source_name".to_string(), "client-v1-7c9b8".to_string()),
            ("destination_name".to_string(), "server-v1-6d4f9".to_string()),
            ("destination_service_name".to_string(), "server".to_string()),
            ("response_flag".to_string(), "-".to_string()),
        ]),
        ..Default::default()
    }
}

/// What [`access_log_entry`] looks like after normalization.
pub fn normalized_access_log_entry() -> LogEntry {
    let mut entry = access_log_entry("ignored");
    entry.timestamp = None;
    entry.severity = LogSeverity::Default;
    if let Some(req) = entry.http_request.as_mut() {
        req.request_size = 0;
        req.response_size = 0;
        req.remote_ip.clear();
        req.server_ip.clear();
        req.latency = None;
    }
    for label in ["request_id", "source_name", "destination_name"] {
        entry.labels.remove(label);
    }
    entry
}
