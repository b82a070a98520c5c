//! Pipeline router and admission control.

use crate::exporters::ExporterHandle;
use shared::models::{SignalKind, TelemetryBatch};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a submission was not accepted.
///
/// Neither variant is fatal to the receiver: `Overloaded` is surfaced to
/// producers as a retryable status, `Unrouted` as a counted rejection.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Downstream capacity is exhausted; the producer should retry later.
    #[error("pipeline at capacity for {0}")]
    Overloaded(SignalKind),

    /// No pipeline is configured for this signal kind.
    #[error("no pipeline configured for {0}")]
    Unrouted(SignalKind),
}

impl AdmissionError {
    /// Returns true if the producer should retry the submission.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Overloaded(_))
    }
}

struct PipelineEntry {
    input: mpsc::Sender<TelemetryBatch>,
    exporters: Vec<ExporterHandle>,
}

impl PipelineEntry {
    /// A pipeline is saturated when every bound exporter queue has zero
    /// free slots. A single full queue only sheds its own deliveries.
    fn is_saturated(&self) -> bool {
        !self.exporters.is_empty() && self.exporters.iter().all(ExporterHandle::is_full)
    }
}

/// Routes decoded batches to the pipeline matching their signal kind.
///
/// Constructed once at startup; the set of pipelines is immutable for the
/// process lifetime.
pub struct PipelineRouter {
    pipelines: HashMap<SignalKind, PipelineEntry>,
    submit_timeout: Duration,
}

impl PipelineRouter {
    /// Creates an empty router with the given submission timeout.
    #[must_use]
    pub fn new(submit_timeout: Duration) -> Self {
        Self {
            pipelines: HashMap::new(),
            submit_timeout,
        }
    }

    /// Registers a pipeline for a signal kind.
    pub fn add_pipeline(
        &mut self,
        kind: SignalKind,
        input: mpsc::Sender<TelemetryBatch>,
        exporters: Vec<ExporterHandle>,
    ) {
        self.pipelines
            .insert(kind, PipelineEntry { input, exporters });
    }

    /// Returns the configured signal kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<SignalKind> {
        self.pipelines.keys().copied().collect()
    }

    /// Returns true if the pipeline for `kind` cannot currently accept
    /// a batch.
    #[must_use]
    pub fn is_saturated(&self, kind: SignalKind) -> bool {
        self.pipelines
            .get(&kind)
            .is_some_and(PipelineEntry::is_saturated)
    }

    /// Routes a batch to its pipeline.
    ///
    /// Blocks up to the submission timeout when the pipeline's inbound
    /// channel is contended; this is the backpressure propagation path
    /// from exporters back to receivers. A batch is never silently
    /// dropped here: every failure is an explicit error for the receiver
    /// to surface.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Unrouted`] when no pipeline handles the
    /// batch's kind, and [`AdmissionError::Overloaded`] when downstream
    /// capacity is exhausted.
    pub async fn submit(&self, batch: TelemetryBatch) -> Result<(), AdmissionError> {
        let kind = batch.kind;
        let entry = self
            .pipelines
            .get(&kind)
            .ok_or(AdmissionError::Unrouted(kind))?;

        if entry.is_saturated() {
            return Err(AdmissionError::Overloaded(kind));
        }

        entry
            .input
            .send_timeout(batch, self.submit_timeout)
            .await
            .map_err(|_| AdmissionError::Overloaded(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporters::{spawn_exporter, ExporterOptions, MockExporter};
    use crate::stats::ExporterStats;
    use shared::config::RetryConfig;
    use shared::models::{LogBody, LogEntry, LogLevel, Resource};
    use std::sync::Arc;
    use tokio::sync::watch;

    fn log_batch() -> TelemetryBatch {
        TelemetryBatch::logs(
            Resource::new(),
            vec![LogEntry::new(LogLevel::Info, LogBody::text("x"))],
        )
    }

    #[tokio::test]
    async fn test_unrouted_kind_is_rejected_explicitly() {
        let router = PipelineRouter::new(Duration::from_millis(50));

        let result = router.submit(log_batch()).await;

        assert!(matches!(result, Err(AdmissionError::Unrouted(SignalKind::Log))));
        assert!(!result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_submit_delivers_to_pipeline_channel() {
        let mut router = PipelineRouter::new(Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(4);
        router.add_pipeline(SignalKind::Log, tx, vec![]);

        router.submit(log_batch()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, SignalKind::Log);
    }

    #[tokio::test]
    async fn test_saturated_exporters_reject_with_retryable_status() {
        // An exporter whose worker never drains: capacity 1, no worker.
        let stats = Arc::new(ExporterStats::new("stuck"));
        let (_drain_tx, drain_rx) = watch::channel(None);
        let (handle, task) = spawn_exporter(
            Arc::new(MockExporter::pending("stuck")),
            ExporterOptions {
                queue_capacity: 1,
                retry: RetryConfig::default(),
            },
            stats,
            drain_rx,
        );

        // Fill: one in flight, one queued.
        let batch = Arc::new(log_batch());
        assert!(handle.try_enqueue(&batch));
        while handle.queue_depth() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(handle.try_enqueue(&batch));
        assert!(handle.is_full());

        let mut router = PipelineRouter::new(Duration::from_millis(50));
        let (tx, _rx) = mpsc::channel(4);
        router.add_pipeline(SignalKind::Log, tx, vec![handle]);

        assert!(router.is_saturated(SignalKind::Log));
        let result = router.submit(log_batch()).await;

        match result {
            Err(err @ AdmissionError::Overloaded(SignalKind::Log)) => {
                assert!(err.is_retryable());
            }
            other => panic!("expected Overloaded, got {other:?}"),
        }

        task.abort();
    }

    #[tokio::test]
    async fn test_full_input_channel_rejects_after_timeout() {
        let mut router = PipelineRouter::new(Duration::from_millis(20));
        let (tx, _rx) = mpsc::channel(1);
        router.add_pipeline(SignalKind::Log, tx, vec![]);

        // First fills the channel; nothing drains it.
        router.submit(log_batch()).await.unwrap();
        let result = router.submit(log_batch()).await;

        assert!(matches!(result, Err(AdmissionError::Overloaded(_))));
    }
}
