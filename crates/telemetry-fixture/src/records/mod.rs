//! Telemetry record model.
//!
//! Serde models of the Cloud Monitoring and Cloud Logging list responses in
//! their proto3 JSON encoding. Envelopes only care about the field holding
//! the record list; unknown fields are ignored.

pub mod logging;
pub mod monitoring;

pub use logging::{
    HttpRequest, ListLogEntriesResponse, LogEntry, LogEntryOperation, LogEntrySourceLocation,
    LogSeverity,
};
pub use monitoring::{
    ListTimeSeriesResponse, Metric, MonitoredResource, Point, TimeInterval, TimeSeries, TypedValue,
};

/// proto3 JSON encodes int64 as a string but decoders accept bare numbers too.
pub(crate) mod int64 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(Int64Visitor)
    }

    pub(crate) struct Int64Visitor;

    impl<'de> Visitor<'de> for Int64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an int64 as a number or decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("int64 out of range: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.parse()
                .map_err(|_| E::custom(format!("invalid int64 string: {v:?}")))
        }

        fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<i64, E> {
            Ok(0)
        }
    }

    /// Same encoding for optional values.
    pub mod option {
        use super::Int64Visitor;
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            struct OptionVisitor;

            impl<'de> serde::de::Visitor<'de> for OptionVisitor {
                type Value = Option<i64>;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("an optional int64")
                }

                fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                    Ok(None)
                }

                fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                    Ok(None)
                }

                fn visit_some<D: Deserializer<'de>>(
                    self,
                    deserializer: D,
                ) -> Result<Self::Value, D::Error> {
                    deserializer.deserialize_any(Int64Visitor).map(Some)
                }
            }

            deserializer.deserialize_option(OptionVisitor)
        }
    }
}

/// int32 is a JSON number on the wire, but decoders also accept a string.
pub(crate) mod int32 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        deserializer.deserialize_any(Int32Visitor)
    }

    struct Int32Visitor;

    impl<'de> Visitor<'de> for Int32Visitor {
        type Value = i32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an int32 as a number or decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i32, E> {
            i32::try_from(v).map_err(|_| E::custom(format!("int32 out of range: {v}")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i32, E> {
            i32::try_from(v).map_err(|_| E::custom(format!("int32 out of range: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i32, E> {
            v.parse()
                .map_err(|_| E::custom(format!("invalid int32 string: {v:?}")))
        }

        fn visit_unit<E: de::Error>(self) -> Result<i32, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<i32, E> {
            Ok(0)
        }
    }
}

/// proto3 JSON reads `null` as the field's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Skip helper for `#[serde(skip_serializing_if)]`.
pub(crate) fn is_zero(value: &i64) -> bool {
    *value == 0
}
