//! Trace and span data models.
//!
//! Defines the core span structure carried by trace batches.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Length of a trace identifier rendered as lowercase hex (16 bytes).
pub const TRACE_ID_HEX_LEN: usize = 32;

/// Length of a span identifier rendered as lowercase hex (8 bytes).
pub const SPAN_ID_HEX_LEN: usize = 16;

/// Status code for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// No status was recorded for the span.
    #[default]
    Unset,
    /// The span completed without error.
    Ok,
    /// The span encountered an error.
    Error,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Kind of span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Default span kind (internal operation).
    #[default]
    Internal,
    /// The span represents a server handling a request.
    Server,
    /// The span represents a client making a request.
    Client,
    /// The span represents a producer sending a message.
    Producer,
    /// The span represents a consumer receiving a message.
    Consumer,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// An event within a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    /// The name of the event.
    pub name: String,
    /// Timestamp when the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Additional attributes for the event.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A span representing a unit of work in a distributed trace.
///
/// Trace and span identifiers are immutable once decoded from the wire,
/// and a span's end time is never revised after it is set.
///
/// # Example
///
/// ```
/// use shared::models::{Span, SpanKind, SpanStatus};
///
/// let span = Span::new(
///     "0af7651916cd43dd8448eb211c80319c",
///     "b7ad6b7169203331",
///     "HTTP GET /api/users",
/// )
/// .with_kind(SpanKind::Server)
/// .with_attribute("http.method", "GET")
/// .with_attribute("http.status_code", 200);
///
/// assert!(span.validate_span().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Span {
    /// Identifier of the trace this span belongs to (16 bytes, hex).
    #[validate(length(min = 1, message = "Trace ID cannot be empty"))]
    pub trace_id: String,

    /// Identifier of this span (8 bytes, hex).
    #[validate(length(min = 1, message = "Span ID cannot be empty"))]
    pub span_id: String,

    /// The parent span ID (None for root spans).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    /// The name/operation of this span.
    #[validate(length(min = 1, message = "Span name cannot be empty"))]
    pub name: String,

    /// The kind of span.
    #[serde(default)]
    pub kind: SpanKind,

    /// The status of the span.
    #[serde(default)]
    pub status: SpanStatus,

    /// Timestamp when the span started.
    pub start_time: DateTime<Utc>,

    /// Timestamp when the span ended.
    pub end_time: DateTime<Utc>,

    /// Additional attributes for the span.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Events that occurred during the span.
    #[serde(default)]
    pub events: Vec<SpanEvent>,
}

/// Errors that can occur during span validation.
#[derive(Debug, Error)]
pub enum SpanValidationError {
    /// The trace ID is not a 16-byte hex string.
    #[error("Trace ID must be {TRACE_ID_HEX_LEN} hex characters")]
    InvalidTraceId,

    /// The span ID is not an 8-byte hex string.
    #[error("Span ID must be {SPAN_ID_HEX_LEN} hex characters")]
    InvalidSpanId,

    /// The span name is empty.
    #[error("Span name cannot be empty")]
    EmptyName,

    /// The end time is before the start time.
    #[error("End time cannot be before start time")]
    InvalidTimeRange,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

impl Span {
    /// Creates a new span with the current time as both start and end.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            name: name.into(),
            kind: SpanKind::default(),
            status: SpanStatus::default(),
            start_time: now,
            end_time: now,
            attributes: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Sets the parent span ID.
    #[must_use]
    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    /// Sets the span kind.
    #[must_use]
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the span status.
    #[must_use]
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = end_time;
        self
    }

    /// Adds an attribute to the span.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Adds an event to the span.
    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        self.events.push(SpanEvent {
            name: name.into(),
            timestamp,
            attributes: HashMap::new(),
        });
        self
    }

    /// Returns the duration of the span.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Validates the span.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The trace ID is not 32 hex characters
    /// - The span ID is not 16 hex characters
    /// - The name is empty
    /// - The end time is before the start time
    pub fn validate_span(&self) -> Result<(), SpanValidationError> {
        if self.trace_id.len() != TRACE_ID_HEX_LEN || !is_hex(&self.trace_id) {
            return Err(SpanValidationError::InvalidTraceId);
        }
        if self.span_id.len() != SPAN_ID_HEX_LEN || !is_hex(&self.span_id) {
            return Err(SpanValidationError::InvalidSpanId);
        }
        if self.name.is_empty() {
            return Err(SpanValidationError::EmptyName);
        }
        if self.end_time < self.start_time {
            return Err(SpanValidationError::InvalidTimeRange);
        }
        self.validate()?;
        Ok(())
    }
}
