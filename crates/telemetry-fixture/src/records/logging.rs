//! Log entries (`google.logging.v2`).

use super::monitoring::MonitoredResource;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Envelope returned by `/logentries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListLogEntriesResponse {
    #[serde(deserialize_with = "super::null_as_default")]
    pub entries: Vec<LogEntry>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub next_page_token: String,
}

/// `google.logging.type.LogSeverity`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogSeverity {
    const ALL: [LogSeverity; 9] = [
        LogSeverity::Default,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Notice,
        LogSeverity::Warning,
        LogSeverity::Error,
        LogSeverity::Critical,
        LogSeverity::Alert,
        LogSeverity::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Default => "DEFAULT",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO",
            LogSeverity::Notice => "NOTICE",
            LogSeverity::Warning => "WARNING",
            LogSeverity::Error => "ERROR",
            LogSeverity::Critical => "CRITICAL",
            LogSeverity::Alert => "ALERT",
            LogSeverity::Emergency => "EMERGENCY",
        }
    }

    /// Wire number of the severity (multiples of 100).
    pub fn number(&self) -> i64 {
        match self {
            LogSeverity::Default => 0,
            LogSeverity::Debug => 100,
            LogSeverity::Info => 200,
            LogSeverity::Notice => 300,
            LogSeverity::Warning => 400,
            LogSeverity::Error => 500,
            LogSeverity::Critical => 600,
            LogSeverity::Alert => 700,
            LogSeverity::Emergency => 800,
        }
    }

    fn from_number(n: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.number() == n)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeverityVisitor;

        impl<'de> Visitor<'de> for SeverityVisitor {
            type Value = LogSeverity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a LogSeverity name or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LogSeverity, E> {
                LogSeverity::from_name(v)
                    .ok_or_else(|| E::custom(format!("unknown log severity: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LogSeverity, E> {
                LogSeverity::from_number(v)
                    .ok_or_else(|| E::custom(format!("unknown log severity number: {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LogSeverity, E> {
                let n = i64::try_from(v)
                    .map_err(|_| E::custom(format!("unknown log severity number: {v}")))?;
                self.visit_i64(n)
            }

            fn visit_unit<E: de::Error>(self) -> Result<LogSeverity, E> {
                Ok(LogSeverity::Default)
            }
        }

        deserializer.deserialize_any(SeverityVisitor)
    }
}

/// `google.logging.type.HttpRequest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequest {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub request_method: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub request_url: String,
    #[serde(with = "super::int64", skip_serializing_if = "super::is_zero")]
    pub request_size: i64,
    #[serde(with = "super::int32", skip_serializing_if = "is_zero_i32")]
    pub status: i32,
    #[serde(with = "super::int64", skip_serializing_if = "super::is_zero")]
    pub response_size: i64,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub user_agent: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub remote_ip: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub server_ip: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub referer: String,
    /// proto3 JSON `Duration`, e.g. `"0.012s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub cache_lookup: bool,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub cache_hit: bool,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub cache_validated_with_origin_server: bool,
    #[serde(with = "super::int64", skip_serializing_if = "super::is_zero")]
    pub cache_fill_bytes: i64,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub protocol: String,
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntryOperation {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub producer: String,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub first: bool,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub last: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntrySourceLocation {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub file: String,
    #[serde(with = "super::int64", skip_serializing_if = "super::is_zero")]
    pub line: i64,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub function: String,
}

/// A structured log entry as buffered by the mock backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub log_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<MonitoredResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto_payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_timestamp: Option<DateTime<Utc>>,
    pub severity: LogSeverity,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub insert_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequest>,
    #[serde(skip_serializing_if = "HashMap::is_empty", deserialize_with = "super::null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<LogEntryOperation>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub trace: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub span_id: String,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "super::null_as_default"
    )]
    pub trace_sampled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_location: Option<LogEntrySourceLocation>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_accepts_names_and_numbers() {
        let by_name: LogSeverity = serde_json::from_value(json!("ERROR")).unwrap();
        let by_number: LogSeverity = serde_json::from_value(json!(500)).unwrap();

        assert_eq!(by_name, LogSeverity::Error);
        assert_eq!(by_number, LogSeverity::Error);
        assert_eq!(serde_json::to_value(LogSeverity::Error).unwrap(), json!("ERROR"));
    }

    #[test]
    fn test_severity_rejects_unknown() {
        assert!(serde_json::from_value::<LogSeverity>(json!("LOUD")).is_err());
        assert!(serde_json::from_value::<LogSeverity>(json!(250)).is_err());
    }

    #[test]
    fn test_severity_defaults_when_absent() {
        let entry: LogEntry = serde_json::from_value(json!({"logName": "server"})).unwrap();
        assert_eq!(entry.severity, LogSeverity::Default);
        assert_eq!(entry.http_request, None);
    }

    #[test]
    fn test_decodes_full_entry() {
        let body = json!({
            "entries": [{
                "logName": "projects/test/logs/server-accesslog-stackdriver",
                "timestamp": "2024-05-01T10:00:00.123Z",
                "severity": "INFO",
                "httpRequest": {
                    "requestMethod": "GET",
                    "requestUrl": "http://srv/echo",
                    "requestSize": "128",
                    "status": 200,
                    "responseSize": "512",
                    "remoteIp": "10.0.0.1:4312",
                    "serverIp": "10.0.0.2:8080",
                    "latency": "0.004s",
                    "protocol": "http"
                },
                "labels": {"request_id": "r-1", "destination_workload": "srv"},
                "trace": "projects/test/traces/abc"
            }],
            "nextPageToken": ""
        });

        let resp: ListLogEntriesResponse = serde_json::from_value(body).unwrap();
        let entry = &resp.entries[0];

        assert_eq!(entry.severity, LogSeverity::Info);
        assert!(entry.timestamp.is_some());
        let http = entry.http_request.as_ref().unwrap();
        assert_eq!(http.request_size, 128);
        assert_eq!(http.response_size, 512);
        assert_eq!(http.status, 200);
        assert_eq!(http.latency.as_deref(), Some("0.004s"));
        assert_eq!(entry.labels["destination_workload"], "srv");
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let body = json!({
            "entries": [{
                "logName": null,
                "severity": null,
                "labels": null,
                "trace": null,
                "traceSampled": null,
                "httpRequest": {
                    "requestMethod": null,
                    "requestSize": null,
                    "status": "200",
                    "cacheHit": null
                }
            }],
            "nextPageToken": null
        });

        let resp: ListLogEntriesResponse = serde_json::from_value(body).unwrap();
        let entry = &resp.entries[0];

        assert_eq!(entry.log_name, "");
        assert_eq!(entry.severity, LogSeverity::Default);
        assert!(entry.labels.is_empty());
        assert!(!entry.trace_sampled);
        let http = entry.http_request.as_ref().unwrap();
        assert_eq!(http.request_size, 0);
        assert_eq!(http.status, 200);
        assert!(!http.cache_hit);
    }

    #[test]
    fn test_null_entries_decode_as_empty() {
        let resp: ListLogEntriesResponse = serde_json::from_str(r#"{"entries":null}"#).unwrap();
        assert!(resp.entries.is_empty());
    }
}
