//! Metric time series (`google.monitoring.v3`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope returned by `/timeseries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListTimeSeriesResponse {
    #[serde(deserialize_with = "super::null_as_default")]
    pub time_series: Vec<TimeSeries>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub next_page_token: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub unit: String,
}

/// A metric descriptor instance: type plus label values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metric {
    #[serde(rename = "type", deserialize_with = "super::null_as_default")]
    pub metric_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", deserialize_with = "super::null_as_default")]
    pub labels: HashMap<String, String>,
}

/// The monitored resource a series or log entry is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitoredResource {
    #[serde(rename = "type", deserialize_with = "super::null_as_default")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", deserialize_with = "super::null_as_default")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// A single value. Exactly one field is set on well-formed input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypedValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(
        with = "super::int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub int64_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Distributions are kept as raw JSON; nothing here inspects buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Point {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<TimeInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TypedValue>,
}

/// A metric time series as buffered by the mock backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeries {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<MonitoredResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub metric_kind: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub value_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "super::null_as_default")]
    pub points: Vec<Point>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "super::null_as_default")]
    pub unit: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_envelope_and_ignores_unknown_fields() {
        let body = json!({
            "timeSeries": [{
                "metric": {
                    "type": "istio.io/service/server/request_count",
                    "labels": {"response_code": "200"}
                },
                "resource": {"type": "k8s_container", "labels": {"pod_name": "p-1"}},
                "metricKind": "CUMULATIVE",
                "valueType": "INT64",
                "points": [{
                    "interval": {"endTime": "2024-05-01T10:00:00Z"},
                    "value": {"int64Value": "17"}
                }]
            }],
            "executionErrors": [],
            "somethingNew": true
        });

        let resp: ListTimeSeriesResponse = serde_json::from_value(body).unwrap();

        assert_eq!(resp.time_series.len(), 1);
        let series = &resp.time_series[0];
        let metric = series.metric.as_ref().unwrap();
        assert_eq!(metric.metric_type, "istio.io/service/server/request_count");
        assert_eq!(metric.labels["response_code"], "200");
        assert_eq!(series.metric_kind, "CUMULATIVE");
        assert_eq!(
            series.points[0].value.as_ref().unwrap().int64_value,
            Some(17)
        );
    }

    #[test]
    fn test_missing_list_decodes_as_empty() {
        let resp: ListTimeSeriesResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.time_series.is_empty());
    }

    #[test]
    fn test_serializes_camel_case() {
        let series = TimeSeries {
            metric: Some(Metric {
                metric_type: "custom/m".to_string(),
                labels: HashMap::new(),
            }),
            metric_kind: "GAUGE".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value, json!({"metric": {"type": "custom/m"}, "metricKind": "GAUGE"}));
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let body = json!({
            "timeSeries": [{
                "metric": {"type": "custom/m", "labels": null},
                "resource": {"type": null, "labels": null},
                "metricKind": null,
                "points": null,
                "unit": null
            }],
            "unit": null
        });

        let resp: ListTimeSeriesResponse = serde_json::from_value(body).unwrap();
        let series = &resp.time_series[0];

        assert!(series.metric.as_ref().unwrap().labels.is_empty());
        assert_eq!(series.resource.as_ref().unwrap().resource_type, "");
        assert_eq!(series.metric_kind, "");
        assert!(series.points.is_empty());

        let empty: ListTimeSeriesResponse =
            serde_json::from_str(r#"{"timeSeries":null}"#).unwrap();
        assert!(empty.time_series.is_empty());
    }
}
