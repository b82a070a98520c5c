//! Log data model.
//!
//! Defines the core `LogEntry` structure carried by log batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Log severity level.
///
/// Follows standard syslog-style severity levels. Levels order by
/// severity, `Trace` lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debug information.
    Trace,
    /// Debug information.
    Debug,
    /// Informational messages.
    Info,
    /// Warning conditions.
    Warn,
    /// Error conditions.
    Error,
    /// Critical/fatal conditions.
    Fatal,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "err" => Ok(Self::Error),
            "fatal" | "critical" => Ok(Self::Fatal),
            _ => Err(()),
        }
    }
}

/// The body of a log entry: either free text or a structured mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogBody {
    /// A plain text message.
    Text(String),
    /// A structured body, e.g. a parsed JSON object.
    Structured(serde_json::Value),
}

impl LogBody {
    /// Creates a text body.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns the text content if this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Structured(_) => None,
        }
    }

    /// Returns true if the body carries no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Structured(v) => v.is_null(),
        }
    }
}

impl std::fmt::Display for LogBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

/// A log entry representing a single log event.
///
/// # Example
///
/// ```
/// use shared::models::{LogBody, LogEntry, LogLevel};
///
/// let log = LogEntry::new(LogLevel::Info, LogBody::text("User logged in"))
///     .with_attribute("user_id", "12345");
///
/// assert!(log.validate_entry().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogEntry {
    /// Timestamp when the log event occurred.
    pub timestamp: DateTime<Utc>,

    /// Severity level of the log.
    #[serde(default)]
    pub level: LogLevel,

    /// The log body: free text or a structured mapping.
    pub body: LogBody,

    /// Additional key-value attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Optional trace ID for distributed tracing correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Optional span ID for distributed tracing correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

/// Errors that can occur during log entry validation.
#[derive(Debug, Error)]
pub enum LogValidationError {
    /// The log body is empty.
    #[error("Log body cannot be empty")]
    EmptyBody,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl LogEntry {
    /// Creates a new log entry with the current timestamp.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::models::{LogBody, LogEntry, LogLevel};
    ///
    /// let log = LogEntry::new(LogLevel::Info, LogBody::text("Server started"));
    /// assert_eq!(log.level, LogLevel::Info);
    /// ```
    #[must_use]
    pub fn new(level: LogLevel, body: LogBody) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            body,
            attributes: HashMap::new(),
            trace_id: None,
            span_id: None,
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds an attribute to the log entry.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Sets the trace ID for distributed tracing correlation.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the span ID for distributed tracing correlation.
    #[must_use]
    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Validates the log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty.
    pub fn validate_entry(&self) -> Result<(), LogValidationError> {
        if self.body.is_empty() {
            return Err(LogValidationError::EmptyBody);
        }
        self.validate()?;
        Ok(())
    }
}
