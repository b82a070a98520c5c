//! Conversions between wire protocol types and internal Flowgate types.
//!
//! Each conversion handles a single record and returns a [`DecodeError`]
//! when that record is malformed, so receivers can skip and count bad
//! records without failing the rest of the batch.

use crate::models::{
    HistogramBucket, HistogramData, LogBody, LogEntry, LogLevel, MetricKind, MetricPoint,
    MetricValue, Resource, Span, SpanEvent, SpanKind, SpanStatus,
};
use crate::wire::proto::telemetry::v1 as wire;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;

/// Errors produced when a single wire record cannot be decoded.
///
/// These are per-record and recoverable: the receiver skips the record,
/// increments its decode-failure counter, and keeps the rest of the batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The trace identifier is not 16 bytes.
    #[error("trace id must be 16 bytes, got {0}")]
    InvalidTraceId(usize),

    /// The span identifier is not 8 bytes.
    #[error("span id must be 8 bytes, got {0}")]
    InvalidSpanId(usize),

    /// The parent span identifier is neither empty nor 8 bytes.
    #[error("parent span id must be 8 bytes, got {0}")]
    InvalidParentSpanId(usize),

    /// The span end time precedes its start time.
    #[error("span end time precedes start time")]
    InvalidTimeRange,

    /// The log record carries no body.
    #[error("log record has no body")]
    EmptyBody,

    /// The metric point has no name.
    #[error("metric point has no name")]
    MissingMetricName,

    /// The metric point carries no value.
    #[error("metric point has no value")]
    MissingMetricValue,

    /// The metric value shape does not match the declared kind.
    #[error("metric value does not match declared kind")]
    MetricKindMismatch,

    /// Histogram bounds and counts are inconsistent or unsorted.
    #[error("histogram bounds and counts are inconsistent")]
    InvalidHistogram,
}

/// Converts a wire timestamp (nanoseconds since epoch) to a `DateTime<Utc>`.
fn timestamp_to_datetime(nanos: u64) -> DateTime<Utc> {
    let duration = Duration::from_nanos(nanos);
    DateTime::<Utc>::from(UNIX_EPOCH + duration)
}

/// Converts a wire `AnyValue` to `serde_json::Value`.
pub fn any_value_to_json(value: &wire::AnyValue) -> serde_json::Value {
    use wire::any_value::Value;

    match &value.value {
        Some(Value::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Value::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Value::IntValue(i)) => serde_json::Value::Number((*i).into()),
        Some(Value::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(Value::ArrayValue(arr)) => {
            let values: Vec<serde_json::Value> = arr.values.iter().map(any_value_to_json).collect();
            serde_json::Value::Array(values)
        }
        Some(Value::KvlistValue(kv)) => {
            let mut map = serde_json::Map::new();
            for pair in &kv.values {
                if let Some(ref v) = pair.value {
                    map.insert(pair.key.clone(), any_value_to_json(v));
                }
            }
            serde_json::Value::Object(map)
        }
        Some(Value::BytesValue(b)) => {
            use base64::Engine;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        None => serde_json::Value::Null,
    }
}

/// Converts wire key-value pairs to a `HashMap`.
pub fn key_values_to_map(attributes: &[wire::KeyValue]) -> HashMap<String, serde_json::Value> {
    attributes
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_json(v)))
        })
        .collect()
}

/// Converts wire key-value pairs to a string-only `HashMap`.
///
/// Non-string values are skipped; metric labels are strings by contract.
pub fn key_values_to_string_map(attributes: &[wire::KeyValue]) -> HashMap<String, String> {
    attributes
        .iter()
        .filter_map(|kv| {
            kv.value.as_ref().and_then(|v| {
                if let Some(wire::any_value::Value::StringValue(s)) = &v.value {
                    Some((kv.key.clone(), s.clone()))
                } else {
                    None
                }
            })
        })
        .collect()
}

/// Converts an optional wire resource into the internal `Resource`.
#[must_use]
pub fn resource_from_wire(resource: Option<&wire::Resource>) -> Resource {
    Resource {
        attributes: resource
            .map(|r| key_values_to_map(&r.attributes))
            .unwrap_or_default(),
    }
}

/// Converts a wire severity number to `LogLevel`.
///
/// Severity numbers follow the syslog-style ranges: 1-4 trace, 5-8 debug,
/// 9-12 info, 13-16 warn, 17-20 error, 21-24 fatal.
#[must_use]
pub fn severity_from_number(severity: u32) -> LogLevel {
    match severity {
        1..=4 => LogLevel::Trace,
        5..=8 => LogLevel::Debug,
        13..=16 => LogLevel::Warn,
        17..=20 => LogLevel::Error,
        21..=24 => LogLevel::Fatal,
        _ => LogLevel::Info, // Default
    }
}

/// Converts a wire span status to `SpanStatus`.
fn status_from_wire(status: Option<&wire::SpanStatus>) -> SpanStatus {
    match status {
        Some(s) => match wire::StatusCode::try_from(s.code) {
            Ok(wire::StatusCode::Ok) => SpanStatus::Ok,
            Ok(wire::StatusCode::Error) => SpanStatus::Error,
            Ok(wire::StatusCode::Unset) | Err(_) => SpanStatus::Unset,
        },
        None => SpanStatus::Unset,
    }
}

/// Converts a wire span kind to `SpanKind`.
fn kind_from_wire(kind: i32) -> SpanKind {
    match wire::SpanKind::try_from(kind) {
        Ok(wire::SpanKind::Server) => SpanKind::Server,
        Ok(wire::SpanKind::Client) => SpanKind::Client,
        Ok(wire::SpanKind::Producer) => SpanKind::Producer,
        Ok(wire::SpanKind::Consumer) => SpanKind::Consumer,
        Ok(wire::SpanKind::Internal | wire::SpanKind::Unspecified) | Err(_) => SpanKind::Internal,
    }
}

/// Converts a wire `Span` to the internal `Span`.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the identifiers have the wrong length or
/// the end time precedes the start time.
pub fn span_from_wire(span: &wire::Span) -> Result<Span, DecodeError> {
    if span.trace_id.len() != 16 {
        return Err(DecodeError::InvalidTraceId(span.trace_id.len()));
    }
    if span.span_id.len() != 8 {
        return Err(DecodeError::InvalidSpanId(span.span_id.len()));
    }

    let parent_span_id = match span.parent_span_id.len() {
        0 => None,
        8 => Some(hex::encode(&span.parent_span_id)),
        n => return Err(DecodeError::InvalidParentSpanId(n)),
    };

    if span.end_time_unix_nano != 0 && span.end_time_unix_nano < span.start_time_unix_nano {
        return Err(DecodeError::InvalidTimeRange);
    }

    let name = if span.name.is_empty() {
        "unknown".to_string()
    } else {
        span.name.clone()
    };

    let events = span
        .events
        .iter()
        .map(|e| SpanEvent {
            name: e.name.clone(),
            timestamp: timestamp_to_datetime(e.time_unix_nano),
            attributes: key_values_to_map(&e.attributes),
        })
        .collect();

    Ok(Span {
        trace_id: hex::encode(&span.trace_id),
        span_id: hex::encode(&span.span_id),
        parent_span_id,
        name,
        kind: kind_from_wire(span.kind),
        status: status_from_wire(span.status.as_ref()),
        start_time: timestamp_to_datetime(span.start_time_unix_nano),
        end_time: timestamp_to_datetime(span.end_time_unix_nano),
        attributes: key_values_to_map(&span.attributes),
        events,
    })
}

/// Converts a wire `LogRecord` to the internal `LogEntry`.
///
/// # Errors
///
/// Returns [`DecodeError::EmptyBody`] if the record carries no usable body.
pub fn log_from_wire(record: &wire::LogRecord) -> Result<LogEntry, DecodeError> {
    let timestamp = if record.time_unix_nano > 0 {
        timestamp_to_datetime(record.time_unix_nano)
    } else {
        Utc::now()
    };

    let body = match record.body.as_ref() {
        Some(value) => match &value.value {
            Some(wire::any_value::Value::StringValue(s)) if !s.is_empty() => {
                LogBody::Text(s.clone())
            }
            Some(_) => match any_value_to_json(value) {
                serde_json::Value::Null => return Err(DecodeError::EmptyBody),
                structured => LogBody::Structured(structured),
            },
            None => return Err(DecodeError::EmptyBody),
        },
        None => return Err(DecodeError::EmptyBody),
    };

    if body.is_empty() {
        return Err(DecodeError::EmptyBody);
    }

    // Correlation identifiers are best-effort on log records: absent means
    // no correlation, anything present is carried through as hex.
    let trace_id = if record.trace_id.is_empty() {
        None
    } else {
        Some(hex::encode(&record.trace_id))
    };

    let span_id = if record.span_id.is_empty() {
        None
    } else {
        Some(hex::encode(&record.span_id))
    };

    Ok(LogEntry {
        timestamp,
        level: severity_from_number(record.severity_number),
        body,
        attributes: key_values_to_map(&record.attributes),
        trace_id,
        span_id,
    })
}

/// Converts a wire `MetricPoint` to the internal `MetricPoint`.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the name or value is missing, the value
/// shape contradicts the declared kind, or histogram data is inconsistent.
pub fn metric_from_wire(point: &wire::MetricPoint) -> Result<MetricPoint, DecodeError> {
    if point.name.is_empty() {
        return Err(DecodeError::MissingMetricName);
    }

    let timestamp = if point.time_unix_nano > 0 {
        timestamp_to_datetime(point.time_unix_nano)
    } else {
        Utc::now()
    };

    let declared = wire::MetricKind::try_from(point.kind).unwrap_or(wire::MetricKind::Unspecified);

    let (kind, value) = match (declared, point.data.as_ref()) {
        (wire::MetricKind::Counter, Some(wire::metric_point::Data::Value(v))) => {
            (MetricKind::Counter, MetricValue::Simple(*v))
        }
        (
            wire::MetricKind::Gauge | wire::MetricKind::Unspecified,
            Some(wire::metric_point::Data::Value(v)),
        ) => (MetricKind::Gauge, MetricValue::Simple(*v)),
        (
            wire::MetricKind::Histogram | wire::MetricKind::Unspecified,
            Some(wire::metric_point::Data::Histogram(h)),
        ) => (
            MetricKind::Histogram,
            MetricValue::Histogram(histogram_from_wire(h)?),
        ),
        (_, None) => return Err(DecodeError::MissingMetricValue),
        _ => return Err(DecodeError::MetricKindMismatch),
    };

    Ok(MetricPoint {
        name: point.name.clone(),
        kind,
        value,
        timestamp,
        labels: key_values_to_string_map(&point.labels),
    })
}

/// Converts wire histogram data, validating bounds/counts consistency.
fn histogram_from_wire(h: &wire::Histogram) -> Result<HistogramData, DecodeError> {
    if h.upper_bounds.len() != h.bucket_counts.len() {
        return Err(DecodeError::InvalidHistogram);
    }
    let sorted = h.upper_bounds.windows(2).all(|w| w[0] < w[1]);
    if !sorted {
        return Err(DecodeError::InvalidHistogram);
    }

    let buckets = h
        .upper_bounds
        .iter()
        .zip(h.bucket_counts.iter())
        .map(|(bound, count)| HistogramBucket {
            upper_bound: *bound,
            count: *count,
        })
        .collect();

    Ok(HistogramData {
        buckets,
        sum: h.sum,
        count: h.count,
    })
}
