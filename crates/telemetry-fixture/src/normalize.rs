//! Strips run-to-run non-deterministic fields from fetched records.
//!
//! Normalization is idempotent: clearing a cleared field or removing an
//! absent label is a no-op.

use crate::records::{LogEntry, LogSeverity, TimeSeries};

/// Log labels whose values differ on every run.
pub const NONDETERMINISTIC_LOG_LABELS: [&str; 3] =
    ["request_id", "source_name", "destination_name"];

/// In-place removal of fields excluded from test comparison.
pub trait Normalize {
    fn normalize(&mut self);

    #[must_use]
    fn normalized(mut self) -> Self
    where
        Self: Sized,
    {
        self.normalize();
        self
    }
}

impl Normalize for TimeSeries {
    /// Only the series identity survives: points and resource are dropped.
    fn normalize(&mut self) {
        self.points.clear();
        self.resource = None;
    }
}

impl Normalize for LogEntry {
    fn normalize(&mut self) {
        self.timestamp = None;
        self.severity = LogSeverity::Default;

        if let Some(http) = self.http_request.as_mut() {
            http.response_size = 0;
            http.request_size = 0;
            http.server_ip.clear();
            http.remote_ip.clear();
            http.latency = None;
        }

        for key in NONDETERMINISTIC_LOG_LABELS {
            self.labels.remove(key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::records::{HttpRequest, Metric, MonitoredResource, Point, TypedValue};
    use chrono::Utc;
    use std::collections::HashMap;

    fn noisy_entry() -> LogEntry {
        LogEntry {
            log_name: "server-accesslog".to_string(),
            timestamp: Some(Utc::now()),
            severity: LogSeverity::Error,
            http_request: Some(HttpRequest {
                request_method: "GET".to_string(),
                request_size: 120,
                response_size: 4096,
                status: 503,
                server_ip: "10.1.0.4:80".to_string(),
                remote_ip: "10.1.0.9:51234".to_string(),
                latency: Some("0.250s".to_string()),
                ..Default::default()
            }),
            labels: HashMap::from([
                ("request_id".to_string(), "abc".to_string()),
                ("source_name".to_string(), "client-7f9".to_string()),
                ("destination_name".to_string(), "server-1c2".to_string()),
                ("foo".to_string(), "bar".to_string()),
            ]),
            ..Default::default()
        }
    }

    fn noisy_series() -> TimeSeries {
        TimeSeries {
            metric: Some(Metric {
                metric_type: "istio.io/service/client/request_count".to_string(),
                labels: HashMap::from([("response_code".to_string(), "200".to_string())]),
            }),
            resource: Some(MonitoredResource {
                resource_type: "k8s_pod".to_string(),
                labels: HashMap::new(),
            }),
            metric_kind: "CUMULATIVE".to_string(),
            points: vec![Point {
                interval: None,
                value: Some(TypedValue {
                    int64_value: Some(3),
                    ..Default::default()
                }),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_log_entry_postconditions() {
        let entry = noisy_entry().normalized();

        assert_eq!(entry.timestamp, None);
        assert_eq!(entry.severity, LogSeverity::Default);
        let http = entry.http_request.as_ref().unwrap();
        assert_eq!(http.response_size, 0);
        assert_eq!(http.request_size, 0);
        assert!(http.server_ip.is_empty());
        assert!(http.remote_ip.is_empty());
        assert_eq!(http.latency, None);
        for key in NONDETERMINISTIC_LOG_LABELS {
            assert!(!entry.labels.contains_key(key), "{key} should be removed");
        }
    }

    #[test]
    fn test_log_entry_keeps_stable_fields() {
        let entry = noisy_entry().normalized();

        assert_eq!(entry.log_name, "server-accesslog");
        assert_eq!(
            entry.labels,
            HashMap::from([("foo".to_string(), "bar".to_string())])
        );
        let http = entry.http_request.unwrap();
        assert_eq!(http.request_method, "GET");
        assert_eq!(http.status, 503);
    }

    #[test]
    fn test_log_entry_without_http_request() {
        let entry = LogEntry {
            severity: LogSeverity::Warning,
            ..Default::default()
        }
        .normalized();

        assert_eq!(entry.http_request, None);
        assert_eq!(entry.severity, LogSeverity::Default);
    }

    #[test]
    fn test_time_series_postconditions() {
        let series = noisy_series().normalized();

        assert!(series.points.is_empty());
        assert_eq!(series.resource, None);
        assert_eq!(
            series.metric.unwrap().metric_type,
            "istio.io/service/client/request_count"
        );
        assert_eq!(series.metric_kind, "CUMULATIVE");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = noisy_entry().normalized();
        assert_eq!(once.clone().normalized(), once);

        let once = noisy_series().normalized();
        assert_eq!(once.clone().normalized(), once);

        let empty = LogEntry::default().normalized();
        assert_eq!(empty, LogEntry::default());
    }
}
