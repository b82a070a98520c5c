//! Exporter fan-out.
//!
//! Each configured exporter runs as an independent worker task that
//! exclusively owns a bounded queue of batches. One exporter backing off,
//! failing, or being disabled never delays or drops deliveries to its
//! siblings; the only coupling between exporters is the admission check in
//! the pipeline router.

pub mod debug;
pub mod http;
pub mod mock;
mod worker;

pub use debug::DebugExporter;
pub use http::{LogPushExporter, MetricPushExporter, TracePushExporter};
pub use mock::MockExporter;
pub use worker::{spawn_exporter, DrainSignal, ExporterHandle, ExporterOptions};

use anyhow::Context;
use async_trait::async_trait;
use shared::config::{ExporterConfig, ExporterKind};
use shared::models::{SignalKind, TelemetryBatch};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors returned by a single delivery attempt.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A transient backend failure: unreachable, timed out, overloaded.
    /// The worker retries with backoff, then drops and counts the batch.
    #[error("retryable export failure: {0}")]
    Retryable(String),

    /// A permanent failure (e.g. the backend rejects the payload shape).
    /// Disables the exporter for the process lifetime.
    #[error("fatal export failure: {0}")]
    Fatal(String),
}

/// A telemetry backend sender.
///
/// `send` receives the batch by shared reference: fan-out hands the same
/// underlying batch to every exporter, so exporters must never mutate it.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// The exporter name from configuration.
    fn name(&self) -> &str;

    /// Returns true if this exporter can accept the given signal kind.
    fn supports(&self, kind: SignalKind) -> bool;

    /// Attempts to deliver one batch to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Retryable`] for transient failures and
    /// [`ExportError::Fatal`] for permanent ones.
    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError>;
}

/// Builds an exporter instance from its configuration.
///
/// # Errors
///
/// Returns an error if a push exporter is missing its endpoint, the
/// endpoint does not parse, or the HTTP client cannot be constructed.
/// These are startup-time failures; config validation catches the first
/// two earlier with a typed error.
pub fn build_exporter(name: &str, config: &ExporterConfig) -> anyhow::Result<Arc<dyn Exporter>> {
    let timeout = Duration::from_millis(config.timeout_ms);

    match config.kind {
        ExporterKind::Debug => Ok(Arc::new(DebugExporter::new(name))),
        ExporterKind::MetricPush => {
            let endpoint = parse_endpoint(name, config)?;
            Ok(Arc::new(MetricPushExporter::new(name, endpoint, timeout)?))
        }
        ExporterKind::LogPush => {
            let endpoint = parse_endpoint(name, config)?;
            Ok(Arc::new(LogPushExporter::new(name, endpoint, timeout)?))
        }
        ExporterKind::TracePush => {
            let endpoint = parse_endpoint(name, config)?;
            Ok(Arc::new(TracePushExporter::new(name, endpoint, timeout)?))
        }
    }
}

fn parse_endpoint(name: &str, config: &ExporterConfig) -> anyhow::Result<Url> {
    let endpoint = config
        .endpoint
        .as_deref()
        .with_context(|| format!("exporter '{name}' requires an endpoint"))?;
    Url::parse(endpoint).with_context(|| format!("exporter '{name}' has an invalid endpoint"))
}
