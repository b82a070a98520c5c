//! Metric data model.
//!
//! Defines the core `MetricPoint` structure carried by metric batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A counter that only increases (e.g., request count).
    Counter,
    /// A gauge that can go up or down (e.g., temperature, memory usage).
    Gauge,
    /// A histogram for measuring distributions (e.g., request latency).
    Histogram,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

impl Default for MetricKind {
    fn default() -> Self {
        Self::Gauge
    }
}

/// A histogram bucket for distribution metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (exclusive).
    pub upper_bound: f64,
    /// The count of observations in this bucket.
    pub count: u64,
}

/// Histogram data for distribution metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// The histogram buckets, sorted by ascending upper bound.
    pub buckets: Vec<HistogramBucket>,
    /// The sum of all observed values.
    pub sum: f64,
    /// The total count of observations.
    pub count: u64,
}

/// The value of a metric, which varies by metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A simple numeric value (for counters and gauges).
    Simple(f64),
    /// Histogram data for distribution metrics.
    Histogram(HistogramData),
}

impl MetricValue {
    /// Returns the simple value if this is a simple metric.
    #[must_use]
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            Self::Simple(v) => Some(*v),
            Self::Histogram(_) => None,
        }
    }

    /// Returns the histogram data if this is a histogram metric.
    #[must_use]
    pub fn as_histogram(&self) -> Option<&HistogramData> {
        match self {
            Self::Simple(_) => None,
            Self::Histogram(h) => Some(h),
        }
    }
}

/// A metric point representing a single measurement.
///
/// # Example
///
/// ```
/// use shared::models::{MetricKind, MetricPoint, MetricValue};
///
/// let metric = MetricPoint::new(
///     "http_requests_total",
///     MetricKind::Counter,
///     MetricValue::Simple(1234.0),
/// )
/// .with_label("method", "GET")
/// .with_label("status", "200");
///
/// assert!(metric.validate_metric().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricPoint {
    /// The name of the metric (e.g., "`http_requests_total`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// The kind of metric.
    pub kind: MetricKind,

    /// The metric value.
    pub value: MetricValue,

    /// Timestamp when the metric was recorded.
    pub timestamp: DateTime<Utc>,

    /// Labels (dimensions) for the metric.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Errors that can occur during metric validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// The value shape does not match the metric kind.
    #[error("Metric '{0}' value does not match its kind")]
    ValueKindMismatch(String),

    /// Histogram has invalid buckets.
    #[error("Histogram buckets must be sorted in ascending order")]
    InvalidHistogramBuckets,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricPoint {
    /// Creates a new metric point with the current timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MetricKind, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: Utc::now(),
            labels: HashMap::new(),
        }
    }

    /// Creates a new counter metric.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Counter, MetricValue::Simple(value))
    }

    /// Creates a new gauge metric.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Gauge, MetricValue::Simple(value))
    }

    /// Creates a new histogram metric.
    #[must_use]
    pub fn histogram(name: impl Into<String>, data: HistogramData) -> Self {
        Self::new(name, MetricKind::Histogram, MetricValue::Histogram(data))
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a label to the metric.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Validates the metric point.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - The value shape does not match the kind (histogram kind with a
    ///   simple value or vice versa)
    /// - Histogram buckets are not sorted by ascending upper bound
    pub fn validate_metric(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }

        match (&self.kind, &self.value) {
            (MetricKind::Histogram, MetricValue::Histogram(data)) => {
                let sorted = data
                    .buckets
                    .windows(2)
                    .all(|w| w[0].upper_bound < w[1].upper_bound);
                if !sorted {
                    return Err(MetricValidationError::InvalidHistogramBuckets);
                }
            }
            (MetricKind::Counter | MetricKind::Gauge, MetricValue::Simple(_)) => {}
            _ => {
                return Err(MetricValidationError::ValueKindMismatch(self.name.clone()));
            }
        }

        self.validate()?;
        Ok(())
    }
}
