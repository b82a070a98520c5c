//! Record batcher.
//!
//! Coalesces small inbound batches into larger ones to amortize exporter
//! round-trips. Records are grouped by resource fingerprint so records from
//! different producers are never mixed into one batch.

use crate::models::{Record, Resource, SignalKind, TelemetryBatch};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A pending group of records sharing one resource.
#[derive(Debug)]
struct PendingGroup {
    resource: Resource,
    records: Vec<Record>,
    /// When this group must be emitted regardless of size.
    deadline: Instant,
}

/// Coalesces records up to a size or age threshold, whichever is reached
/// first. Remaining partial groups are emitted by [`Batcher::flush`] on
/// shutdown. Never emits an empty batch.
#[derive(Debug)]
pub struct Batcher {
    max_records: usize,
    max_age: Duration,
    groups: HashMap<(SignalKind, u64), PendingGroup>,
}

impl Batcher {
    /// Creates a batcher with the given thresholds.
    ///
    /// `max_records` is clamped to at least 1.
    #[must_use]
    pub fn new(max_records: usize, max_age: Duration) -> Self {
        Self {
            max_records: max_records.max(1),
            max_age,
            groups: HashMap::new(),
        }
    }

    /// Returns the number of records currently buffered.
    #[must_use]
    pub fn pending_records(&self) -> usize {
        self.groups.values().map(|g| g.records.len()).sum()
    }

    /// Adds a batch to the buffer, emitting any groups that reached the
    /// size threshold.
    pub fn push(&mut self, batch: TelemetryBatch) -> Vec<TelemetryBatch> {
        if batch.is_empty() {
            return Vec::new();
        }

        let key = (batch.kind, batch.resource.fingerprint());
        let max_age = self.max_age;
        let group = self.groups.entry(key).or_insert_with(|| PendingGroup {
            resource: batch.resource.clone(),
            records: Vec::new(),
            deadline: Instant::now() + max_age,
        });
        group.records.extend(batch.records);

        let mut out = Vec::new();
        while group.records.len() >= self.max_records {
            let remainder = group.records.split_off(self.max_records);
            let full = std::mem::replace(&mut group.records, remainder);
            out.push(TelemetryBatch::from_records(
                key.0,
                group.resource.clone(),
                full,
            ));
        }

        if group.records.is_empty() {
            self.groups.remove(&key);
        }

        out
    }

    /// Emits every group whose age deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<TelemetryBatch> {
        let due: Vec<(SignalKind, u64)> = self
            .groups
            .iter()
            .filter(|(_, g)| g.deadline <= now)
            .map(|(k, _)| *k)
            .collect();

        due.into_iter()
            .filter_map(|key| {
                self.groups
                    .remove(&key)
                    .filter(|g| !g.records.is_empty())
                    .map(|g| TelemetryBatch::from_records(key.0, g.resource, g.records))
            })
            .collect()
    }

    /// Emits everything still buffered. Flushing an empty batcher is a
    /// no-op.
    pub fn flush(&mut self) -> Vec<TelemetryBatch> {
        self.groups
            .drain()
            .filter(|(_, g)| !g.records.is_empty())
            .map(|(key, g)| TelemetryBatch::from_records(key.0, g.resource, g.records))
            .collect()
    }

    /// The earliest group deadline, if any records are buffered.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups.values().map(|g| g.deadline).min()
    }
}
