//! Internal observability counters.
//!
//! The operational surface of the collector is counters plus readiness
//! status: records received, decode failures, filtered and rejected
//! records per signal, and exported/dropped records per backend with the
//! drop reason. Counters are lock-free atomics; snapshots are taken for
//! the `/stats` and `/health/ready` endpoints.

use serde::Serialize;
use shared::models::SignalKind;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Counters for one telemetry signal.
#[derive(Debug, Default)]
pub struct SignalStats {
    received: AtomicU64,
    decode_failures: AtomicU64,
    filtered: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time view of a [`SignalStats`].
#[derive(Debug, Clone, Serialize)]
pub struct SignalStatsSnapshot {
    /// Records received on the wire, before decoding.
    pub received: u64,
    /// Records skipped because they could not be decoded.
    pub decode_failures: u64,
    /// Records dropped by filter processors.
    pub filtered: u64,
    /// Records rejected by admission control or routing.
    pub rejected: u64,
}

impl SignalStats {
    /// Adds to the received-record count.
    pub fn add_received(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds to the decode-failure count.
    pub fn add_decode_failures(&self, n: u64) {
        self.decode_failures.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds to the filtered-record count.
    pub fn add_filtered(&self, n: u64) {
        self.filtered.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds to the rejected-record count.
    pub fn add_rejected(&self, n: u64) {
        self.rejected.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the decode-failure count.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Returns the rejected-record count.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SignalStatsSnapshot {
        SignalStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Collector-wide per-signal counters.
#[derive(Debug, Default)]
pub struct CollectorStats {
    /// Trace signal counters.
    pub traces: SignalStats,
    /// Log signal counters.
    pub logs: SignalStats,
    /// Metric signal counters.
    pub metrics: SignalStats,
}

/// Point-in-time view of all signal counters.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatsSnapshot {
    /// Trace signal counters.
    pub traces: SignalStatsSnapshot,
    /// Log signal counters.
    pub logs: SignalStatsSnapshot,
    /// Metric signal counters.
    pub metrics: SignalStatsSnapshot,
}

impl CollectorStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters for a signal kind.
    #[must_use]
    pub fn signal(&self, kind: SignalKind) -> &SignalStats {
        match kind {
            SignalKind::Trace => &self.traces,
            SignalKind::Log => &self.logs,
            SignalKind::Metric => &self.metrics,
        }
    }

    /// Takes a point-in-time snapshot of all signals.
    #[must_use]
    pub fn snapshot(&self) -> CollectorStatsSnapshot {
        CollectorStatsSnapshot {
            traces: self.traces.snapshot(),
            logs: self.logs.snapshot(),
            metrics: self.metrics.snapshot(),
        }
    }
}

/// Readiness state of one exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExporterState {
    /// Deliveries are succeeding.
    Healthy,
    /// The last delivery attempt failed transiently; retries are running.
    BackingOff,
    /// A fatal error disabled this exporter for the process lifetime.
    Disabled,
}

impl ExporterState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::BackingOff,
            2 => Self::Disabled,
            _ => Self::Healthy,
        }
    }

    /// Short name used in readiness responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::BackingOff => "backing-off",
            Self::Disabled => "disabled",
        }
    }
}

/// Why a batch never reached its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The exporter queue was full when the pipeline fanned out.
    QueueFull,
    /// The retry budget was exhausted.
    RetryExhausted,
    /// The exporter was disabled by an earlier fatal error.
    Disabled,
    /// The shutdown drain deadline passed.
    Shutdown,
}

/// Per-exporter delivery counters and state.
#[derive(Debug)]
pub struct ExporterStats {
    name: String,
    state: AtomicU8,
    exported_batches: AtomicU64,
    exported_records: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_retry_exhausted: AtomicU64,
    dropped_disabled: AtomicU64,
    dropped_shutdown: AtomicU64,
    retry_attempts: AtomicU64,
}

/// Dropped-record counts by reason.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedSnapshot {
    /// Dropped because the exporter queue was full.
    pub queue_full: u64,
    /// Dropped after exhausting the retry budget.
    pub retry_exhausted: u64,
    /// Dropped because the exporter was disabled.
    pub disabled: u64,
    /// Dropped at the shutdown drain deadline.
    pub shutdown: u64,
}

/// Point-in-time view of an [`ExporterStats`].
#[derive(Debug, Clone, Serialize)]
pub struct ExporterStatsSnapshot {
    /// The exporter name from configuration.
    pub name: String,
    /// Readiness state.
    pub state: ExporterState,
    /// Batches currently queued.
    pub queue_depth: usize,
    /// Batches delivered to the backend.
    pub exported_batches: u64,
    /// Records delivered to the backend.
    pub exported_records: u64,
    /// Records dropped, by reason.
    pub dropped: DroppedSnapshot,
    /// Total retry attempts across all batches.
    pub retry_attempts: u64,
}

impl ExporterStats {
    /// Creates zeroed counters for the named exporter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(0),
            exported_batches: AtomicU64::new(0),
            exported_records: AtomicU64::new(0),
            dropped_queue_full: AtomicU64::new(0),
            dropped_retry_exhausted: AtomicU64::new(0),
            dropped_disabled: AtomicU64::new(0),
            dropped_shutdown: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
        }
    }

    /// The exporter name from configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the readiness state.
    pub fn set_state(&self, state: ExporterState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Returns the readiness state.
    #[must_use]
    pub fn state(&self) -> ExporterState {
        ExporterState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Records a successful delivery of `records` records.
    pub fn record_exported(&self, records: u64) {
        self.exported_batches.fetch_add(1, Ordering::Relaxed);
        self.exported_records.fetch_add(records, Ordering::Relaxed);
    }

    /// Records a dropped batch of `records` records.
    pub fn record_dropped(&self, reason: DropReason, records: u64) {
        let counter = match reason {
            DropReason::QueueFull => &self.dropped_queue_full,
            DropReason::RetryExhausted => &self.dropped_retry_exhausted,
            DropReason::Disabled => &self.dropped_disabled,
            DropReason::Shutdown => &self.dropped_shutdown,
        };
        counter.fetch_add(records, Ordering::Relaxed);
    }

    /// Records one retry attempt.
    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the records exported so far.
    #[must_use]
    pub fn exported_records(&self) -> u64 {
        self.exported_records.load(Ordering::Relaxed)
    }

    /// Returns the records dropped for the given reason.
    #[must_use]
    pub fn dropped(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::QueueFull => &self.dropped_queue_full,
            DropReason::RetryExhausted => &self.dropped_retry_exhausted,
            DropReason::Disabled => &self.dropped_disabled,
            DropReason::Shutdown => &self.dropped_shutdown,
        }
        .load(Ordering::Relaxed)
    }

    /// Takes a point-in-time snapshot. The queue depth is supplied by the
    /// caller since the queue is owned by the exporter handle.
    #[must_use]
    pub fn snapshot(&self, queue_depth: usize) -> ExporterStatsSnapshot {
        ExporterStatsSnapshot {
            name: self.name.clone(),
            state: self.state(),
            queue_depth,
            exported_batches: self.exported_batches.load(Ordering::Relaxed),
            exported_records: self.exported_records.load(Ordering::Relaxed),
            dropped: DroppedSnapshot {
                queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
                retry_exhausted: self.dropped_retry_exhausted.load(Ordering::Relaxed),
                disabled: self.dropped_disabled.load(Ordering::Relaxed),
                shutdown: self.dropped_shutdown.load(Ordering::Relaxed),
            },
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
        }
    }
}
