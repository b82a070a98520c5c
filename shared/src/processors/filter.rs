//! Record filter.
//!
//! Drops records matching (drop mode) or not matching (keep mode) a set of
//! attribute equality rules. Dropped records are counted separately from
//! decode failures.

use crate::models::{Record, TelemetryBatch};
use serde::{Deserialize, Serialize};

/// Whether matching records are dropped or kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Records matching any rule are dropped.
    #[default]
    Drop,
    /// Only records matching at least one rule are kept.
    Keep,
}

/// An attribute equality rule. A record matches when the attribute (or
/// metric label) named `key` renders to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// The attribute or label key to test.
    pub key: String,
    /// The value to compare against, as a string.
    pub value: String,
}

impl FilterRule {
    fn matches(&self, record: &Record) -> bool {
        match record {
            Record::Span(span) => attribute_matches(&span.attributes, &self.key, &self.value),
            Record::Log(log) => attribute_matches(&log.attributes, &self.key, &self.value),
            Record::Metric(metric) => metric.labels.get(&self.key) == Some(&self.value),
        }
    }
}

fn attribute_matches(
    attributes: &std::collections::HashMap<String, serde_json::Value>,
    key: &str,
    value: &str,
) -> bool {
    match attributes.get(key) {
        Some(serde_json::Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

/// Drops records according to the configured mode and rules.
#[derive(Debug)]
pub struct RecordFilter {
    mode: FilterMode,
    rules: Vec<FilterRule>,
    dropped: u64,
}

impl RecordFilter {
    /// Creates a filter from a mode and its rules.
    #[must_use]
    pub fn new(mode: FilterMode, rules: Vec<FilterRule>) -> Self {
        Self {
            mode,
            rules,
            dropped: 0,
        }
    }

    /// Applies the filter, returning the surviving batch. Returns `None`
    /// when every record was dropped.
    pub fn apply(&mut self, batch: TelemetryBatch) -> Option<TelemetryBatch> {
        // A keep filter with no rules keeps everything rather than
        // silently discarding the whole stream.
        if self.rules.is_empty() {
            return Some(batch);
        }

        let before = batch.records.len();
        let records: Vec<Record> = batch
            .records
            .into_iter()
            .filter(|record| {
                let matched = self.rules.iter().any(|rule| rule.matches(record));
                match self.mode {
                    FilterMode::Drop => !matched,
                    FilterMode::Keep => matched,
                }
            })
            .collect();

        self.dropped += (before - records.len()) as u64;

        if records.is_empty() {
            None
        } else {
            Some(TelemetryBatch {
                kind: batch.kind,
                resource: batch.resource,
                records,
            })
        }
    }

    /// Drains the dropped-record count accumulated since the last call.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.dropped)
    }
}
