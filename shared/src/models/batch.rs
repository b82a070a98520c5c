//! Batch and record types.
//!
//! A [`TelemetryBatch`] is the unit of work flowing through the collector:
//! an ordered sequence of records of one signal kind plus the resource
//! attributes of the producing process. Batches are treated as immutable
//! once handed to a processor chain; every transformation builds a new one.

use crate::models::{LogEntry, MetricPoint, Span};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// The three telemetry categories routed independently through the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Distributed trace spans.
    Trace,
    /// Log entries.
    Log,
    /// Metric points.
    Metric,
}

impl SignalKind {
    /// All signal kinds, in routing order.
    pub const ALL: [Self; 3] = [Self::Trace, Self::Log, Self::Metric];
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "traces"),
            Self::Log => write!(f, "logs"),
            Self::Metric => write!(f, "metrics"),
        }
    }
}

/// Attributes identifying the process that produced a batch.
///
/// Keys are attribute names (e.g. `service.name`); values carry the JSON
/// data model (string, number, bool).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The resource attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Resource {
    /// Creates an empty resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, replacing any existing value for the key.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Returns the attribute value for `key` as a string, if present.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Returns the `service.name` attribute, falling back to "unknown".
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.get_str("service.name").unwrap_or("unknown")
    }

    /// Returns a stable fingerprint of the attribute set.
    ///
    /// Two resources with the same keys and values hash identically
    /// regardless of map iteration order. Used by the batcher to coalesce
    /// records without mixing records from different producers.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut entries: Vec<(&String, String)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        entries.sort();

        let mut hasher = DefaultHasher::new();
        for (key, value) in entries {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// A single telemetry record, tagged by signal kind.
///
/// Kept as a sum type so processors dispatch on kind explicitly and
/// exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Record {
    /// A trace span.
    Span(Span),
    /// A log entry.
    Log(LogEntry),
    /// A metric point.
    Metric(MetricPoint),
}

impl Record {
    /// Returns the signal kind of this record.
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Span(_) => SignalKind::Trace,
            Self::Log(_) => SignalKind::Log,
            Self::Metric(_) => SignalKind::Metric,
        }
    }
}

/// An ordered sequence of records sharing one signal kind, plus the
/// resource attributes of the producing process.
///
/// The typed constructors guarantee that every record matches `kind`;
/// batches are never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryBatch {
    /// The signal kind every record in this batch belongs to.
    pub kind: SignalKind,
    /// Attributes of the producing process.
    pub resource: Resource,
    /// The records, in arrival order.
    pub records: Vec<Record>,
}

impl TelemetryBatch {
    /// Creates a trace batch.
    #[must_use]
    pub fn spans(resource: Resource, spans: Vec<Span>) -> Self {
        Self {
            kind: SignalKind::Trace,
            resource,
            records: spans.into_iter().map(Record::Span).collect(),
        }
    }

    /// Creates a log batch.
    #[must_use]
    pub fn logs(resource: Resource, logs: Vec<LogEntry>) -> Self {
        Self {
            kind: SignalKind::Log,
            resource,
            records: logs.into_iter().map(Record::Log).collect(),
        }
    }

    /// Creates a metric batch.
    #[must_use]
    pub fn metrics(resource: Resource, metrics: Vec<MetricPoint>) -> Self {
        Self {
            kind: SignalKind::Metric,
            resource,
            records: metrics.into_iter().map(Record::Metric).collect(),
        }
    }

    /// Creates a batch of the given kind from already-tagged records.
    ///
    /// Records whose kind does not match are discarded; the typed
    /// constructors above should be preferred.
    #[must_use]
    pub fn from_records(kind: SignalKind, resource: Resource, records: Vec<Record>) -> Self {
        Self {
            kind,
            resource,
            records: records.into_iter().filter(|r| r.kind() == kind).collect(),
        }
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogBody, LogLevel, MetricPoint, Span};

    #[test]
    fn test_signal_kind_display() {
        assert_eq!(SignalKind::Trace.to_string(), "traces");
        assert_eq!(SignalKind::Log.to_string(), "logs");
        assert_eq!(SignalKind::Metric.to_string(), "metrics");
    }

    #[test]
    fn test_resource_fingerprint_order_independent() {
        let a = Resource::new()
            .with_attribute("service.name", "api")
            .with_attribute("deployment.environment", "prod");
        let b = Resource::new()
            .with_attribute("deployment.environment", "prod")
            .with_attribute("service.name", "api");

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_resource_fingerprint_differs_on_value_change() {
        let a = Resource::new().with_attribute("service.name", "api");
        let b = Resource::new().with_attribute("service.name", "worker");

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_resource_service_name_fallback() {
        let named = Resource::new().with_attribute("service.name", "api");
        assert_eq!(named.service_name(), "api");

        let anonymous = Resource::new();
        assert_eq!(anonymous.service_name(), "unknown");
    }

    #[test]
    fn test_batch_constructors_tag_kind() {
        let spans = TelemetryBatch::spans(
            Resource::new(),
            vec![Span::new(
                "0102030405060708090a0b0c0d0e0f10",
                "0102030405060708",
                "op",
            )],
        );
        assert_eq!(spans.kind, SignalKind::Trace);
        assert_eq!(spans.len(), 1);

        let logs = TelemetryBatch::logs(
            Resource::new(),
            vec![LogEntry::new(LogLevel::Info, LogBody::text("hello"))],
        );
        assert_eq!(logs.kind, SignalKind::Log);

        let metrics =
            TelemetryBatch::metrics(Resource::new(), vec![MetricPoint::gauge("cpu", 0.5)]);
        assert_eq!(metrics.kind, SignalKind::Metric);
    }

    #[test]
    fn test_from_records_discards_mismatched_kinds() {
        let records = vec![
            Record::Log(LogEntry::new(LogLevel::Info, LogBody::text("keep"))),
            Record::Metric(MetricPoint::gauge("discard", 1.0)),
        ];

        let batch = TelemetryBatch::from_records(SignalKind::Log, Resource::new(), records);
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch.records[0], Record::Log(_)));
    }

    #[test]
    fn test_empty_batch() {
        let batch = TelemetryBatch::logs(Resource::new(), vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
