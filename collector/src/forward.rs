//! Row-forwarding receiver.
//!
//! A line-oriented TCP transport for unstructured container output. Each
//! connection is read line by line; a line that parses as a JSON object
//! gets best-effort structured-field extraction (severity, timestamp,
//! message, trace correlation, remaining fields as attributes), anything
//! else becomes a raw text body. Rows are grouped into small batches per
//! connection, bounded by count and idle time.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use shared::models::{LogBody, LogEntry, LogLevel, Resource, TelemetryBatch};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Tuning for the forward receiver.
#[derive(Debug, Clone, Copy)]
pub struct ForwardOptions {
    /// Maximum rows grouped into one batch per connection.
    pub max_batch_lines: usize,
    /// Idle time after which a partial row group is submitted.
    pub flush_idle: Duration,
}

impl From<&shared::config::ForwardReceiverConfig> for ForwardOptions {
    fn from(config: &shared::config::ForwardReceiverConfig) -> Self {
        Self {
            max_batch_lines: config.max_batch_lines.max(1),
            flush_idle: Duration::from_millis(config.flush_idle_ms),
        }
    }
}

/// Accepts forward connections until shutdown is signaled.
pub async fn run_forward_listener(
    listener: TcpListener,
    state: AppState,
    options: ForwardOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "forward connection accepted");
                    let state = state.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(handle_connection(stream, state, options, shutdown));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "forward accept failed");
                }
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::debug!("forward listener stopping");
                    break;
                }
            }
        }
    }
}

/// Reads one connection line by line, submitting row groups.
async fn handle_connection(
    stream: TcpStream,
    state: AppState,
    options: ForwardOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(stream).lines();
    let mut pending: Vec<LogEntry> = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(entry) = parse_forward_line(&line) {
                        state.stats().logs.add_received(1);
                        pending.push(entry);
                    }
                    if pending.len() >= options.max_batch_lines {
                        submit_rows(&state, std::mem::take(&mut pending)).await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Undecodable input; the stream cannot be resynced.
                    state.stats().logs.add_decode_failures(1);
                    tracing::debug!(error = %e, "forward connection read failed");
                    break;
                }
            },
            () = tokio::time::sleep(options.flush_idle), if !pending.is_empty() => {
                submit_rows(&state, std::mem::take(&mut pending)).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if !pending.is_empty() {
        submit_rows(&state, pending).await;
    }
}

/// Submits a group of rows as one log batch.
async fn submit_rows(state: &AppState, entries: Vec<LogEntry>) {
    let count = entries.len() as u64;
    let resource = Resource::new().with_attribute("telemetry.receiver", "forward");
    let batch = TelemetryBatch::logs(resource, entries);

    if let Err(error) = state.router().submit(batch).await {
        // The row protocol has no status channel; rejected rows can only
        // be counted.
        state.stats().logs.add_rejected(count);
        tracing::debug!(error = %error, rows = count, "forward rows rejected");
    }
}

/// Keys consumed by structured-field extraction; everything else becomes
/// an attribute.
const LEVEL_KEYS: [&str; 2] = ["level", "severity"];
const TIME_KEYS: [&str; 3] = ["timestamp", "time", "ts"];
const MESSAGE_KEYS: [&str; 2] = ["message", "msg"];

/// Parses one forwarded row into a log entry.
///
/// Returns `None` for blank lines. A line parsing as a JSON object yields
/// structured fields; anything else is a raw text body with the current
/// timestamp and default severity.
#[must_use]
pub fn parse_forward_line(line: &str) -> Option<LogEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            return Some(entry_from_json(map));
        }
    }

    Some(LogEntry::new(LogLevel::Info, LogBody::text(trimmed)))
}

fn entry_from_json(map: serde_json::Map<String, serde_json::Value>) -> LogEntry {
    let level = LEVEL_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(|v| v.as_str())
        .find_map(|s| s.parse::<LogLevel>().ok())
        .unwrap_or_default();

    let timestamp = TIME_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(|v| v.as_str())
        .find_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

    let message = MESSAGE_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|v| v.as_str())
        .map(str::to_string);

    let trace_id = map.get("trace_id").and_then(|v| v.as_str()).map(String::from);
    let span_id = map.get("span_id").and_then(|v| v.as_str()).map(String::from);

    let consumed: Vec<&str> = LEVEL_KEYS
        .iter()
        .chain(TIME_KEYS.iter())
        .chain(MESSAGE_KEYS.iter())
        .copied()
        .chain(["trace_id", "span_id"])
        .collect();

    let mut entry = match message {
        Some(text) => {
            let mut entry = LogEntry::new(level, LogBody::Text(text)).with_timestamp(timestamp);
            for (key, value) in map {
                if !consumed.contains(&key.as_str()) {
                    entry.attributes.insert(key, value);
                }
            }
            entry
        }
        // No message field: keep the whole object as the structured body.
        None => LogEntry::new(level, LogBody::Structured(serde_json::Value::Object(map)))
            .with_timestamp(timestamp),
    };

    entry.trace_id = trace_id;
    entry.span_id = span_id;
    entry
}
