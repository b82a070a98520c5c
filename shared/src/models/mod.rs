//! Data models for the Flowgate telemetry collector.
//!
//! This module contains the core data structures for spans, log entries,
//! metric points, and the batches that carry them through the pipeline.

pub mod batch;
pub mod log;
pub mod metric;
pub mod trace;

pub use batch::{Record, Resource, SignalKind, TelemetryBatch};
pub use log::{LogBody, LogEntry, LogLevel, LogValidationError};
pub use metric::{
    HistogramBucket, HistogramData, MetricKind, MetricPoint, MetricValidationError, MetricValue,
};
pub use trace::{Span, SpanEvent, SpanKind, SpanStatus, SpanValidationError};
