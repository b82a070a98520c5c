//! Debug exporter.
//!
//! Writes a one-line summary of every batch to the process log instead of
//! pushing anywhere. Accepts all signal kinds; useful in development, in
//! tests, and as a tee next to a real backend.

use super::{ExportError, Exporter};
use async_trait::async_trait;
use shared::models::{SignalKind, TelemetryBatch};

/// Logs batch summaries via `tracing`.
#[derive(Debug)]
pub struct DebugExporter {
    name: String,
}

impl DebugExporter {
    /// Creates a debug exporter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Exporter for DebugExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, _kind: SignalKind) -> bool {
        true
    }

    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        tracing::info!(
            exporter = %self.name,
            kind = %batch.kind,
            records = batch.len(),
            service = %batch.resource.service_name(),
            "exported batch"
        );
        Ok(())
    }
}
