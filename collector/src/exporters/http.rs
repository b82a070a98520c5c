//! HTTP push exporters.
//!
//! All three backends are push APIs over HTTP with JSON payloads:
//! a remote-write style sample push for metrics, a stream push for logs
//! (one stream per severity, Loki-shaped), and a span batch push for
//! traces. Transport failures and 429/5xx responses are retryable; any
//! other non-success status is treated as a permanent misconfiguration.

use super::{ExportError, Exporter};
use async_trait::async_trait;
use serde::Serialize;
use shared::models::{
    LogLevel, MetricKind, MetricValue, Record, SignalKind, TelemetryBatch,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use url::Url;

fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn status_to_result(status: reqwest::StatusCode) -> Result<(), ExportError> {
    if status.is_success() {
        Ok(())
    } else if status.as_u16() == 429 || status.is_server_error() {
        Err(ExportError::Retryable(format!("backend returned {status}")))
    } else {
        Err(ExportError::Fatal(format!("backend returned {status}")))
    }
}

async fn post_json<T: Serialize>(
    client: &reqwest::Client,
    endpoint: &Url,
    body: &T,
) -> Result<(), ExportError> {
    let response = client
        .post(endpoint.clone())
        .json(body)
        .send()
        .await
        .map_err(|e| ExportError::Retryable(e.to_string()))?;

    status_to_result(response.status())
}

/// One metric sample in a push payload.
#[derive(Debug, Serialize)]
struct MetricSample<'a> {
    name: &'a str,
    kind: MetricKind,
    value: &'a MetricValue,
    timestamp_ms: i64,
    labels: &'a HashMap<String, String>,
}

/// Payload of a metric push request.
#[derive(Debug, Serialize)]
struct MetricPushPayload<'a> {
    resource: &'a HashMap<String, serde_json::Value>,
    samples: Vec<MetricSample<'a>>,
}

fn metric_payload(batch: &TelemetryBatch) -> MetricPushPayload<'_> {
    let samples = batch
        .records
        .iter()
        .filter_map(|record| match record {
            Record::Metric(m) => Some(MetricSample {
                name: &m.name,
                kind: m.kind,
                value: &m.value,
                timestamp_ms: m.timestamp.timestamp_millis(),
                labels: &m.labels,
            }),
            Record::Span(_) | Record::Log(_) => None,
        })
        .collect();

    MetricPushPayload {
        resource: &batch.resource.attributes,
        samples,
    }
}

/// Remote-write style metric push exporter.
#[derive(Debug)]
pub struct MetricPushExporter {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl MetricPushExporter {
    /// Creates a metric push exporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        name: impl Into<String>,
        endpoint: Url,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            name: name.into(),
            endpoint,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl Exporter for MetricPushExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: SignalKind) -> bool {
        kind == SignalKind::Metric
    }

    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        post_json(&self.client, &self.endpoint, &metric_payload(batch)).await
    }
}

/// One log stream: a label set plus timestamped lines.
#[derive(Debug, Serialize)]
struct LogStream {
    stream: BTreeMap<String, String>,
    /// Pairs of (nanosecond timestamp, line).
    values: Vec<[String; 2]>,
}

/// Payload of a log push request.
#[derive(Debug, Serialize)]
struct LogPushPayload {
    streams: Vec<LogStream>,
}

fn log_payload(batch: &TelemetryBatch) -> LogPushPayload {
    let service = batch.resource.service_name().to_string();

    // One stream per severity keeps label cardinality flat.
    let mut by_level: BTreeMap<LogLevel, Vec<[String; 2]>> = BTreeMap::new();
    for record in &batch.records {
        if let Record::Log(log) = record {
            let ts = log.timestamp.timestamp_nanos_opt().unwrap_or_default();
            by_level
                .entry(log.level)
                .or_default()
                .push([ts.to_string(), log.body.to_string()]);
        }
    }

    let streams = by_level
        .into_iter()
        .map(|(level, values)| {
            let mut stream = BTreeMap::new();
            stream.insert("service".to_string(), service.clone());
            stream.insert("level".to_string(), level.to_string());
            LogStream { stream, values }
        })
        .collect();

    LogPushPayload { streams }
}

/// Structured log stream push exporter.
#[derive(Debug)]
pub struct LogPushExporter {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl LogPushExporter {
    /// Creates a log push exporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        name: impl Into<String>,
        endpoint: Url,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            name: name.into(),
            endpoint,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl Exporter for LogPushExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: SignalKind) -> bool {
        kind == SignalKind::Log
    }

    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        post_json(&self.client, &self.endpoint, &log_payload(batch)).await
    }
}

/// Payload of a span push request.
#[derive(Debug, Serialize)]
struct TracePushPayload<'a> {
    resource: &'a HashMap<String, serde_json::Value>,
    spans: Vec<&'a shared::models::Span>,
}

fn trace_payload(batch: &TelemetryBatch) -> TracePushPayload<'_> {
    let spans = batch
        .records
        .iter()
        .filter_map(|record| match record {
            Record::Span(span) => Some(span),
            Record::Log(_) | Record::Metric(_) => None,
        })
        .collect();

    TracePushPayload {
        resource: &batch.resource.attributes,
        spans,
    }
}

/// Span batch push exporter.
#[derive(Debug)]
pub struct TracePushExporter {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl TracePushExporter {
    /// Creates a trace push exporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        name: impl Into<String>,
        endpoint: Url,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            name: name.into(),
            endpoint,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl Exporter for TracePushExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: SignalKind) -> bool {
        kind == SignalKind::Trace
    }

    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        post_json(&self.client, &self.endpoint, &trace_payload(batch)).await
    }
}
