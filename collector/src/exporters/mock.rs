//! Scriptable exporter for development and tests.
//!
//! Records every batch it acknowledges and can be scripted to fail
//! transiently, fail fatally, or hang forever, which is how the pipeline
//! tests exercise retry, isolation, and drain behavior without a real
//! backend.

use super::{ExportError, Exporter};
use async_trait::async_trait;
use shared::models::{SignalKind, TelemetryBatch};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// What the mock does on each `send`.
#[derive(Debug, Clone, Copy)]
enum MockBehavior {
    /// Acknowledge every batch.
    Ack,
    /// Fail every attempt with a retryable error.
    FailRetryable,
    /// Fail the first attempt with a fatal error.
    FailFatal,
    /// Never complete; simulates a hung backend.
    Pending,
    /// Fail the first `n` attempts with retryable errors, then ack.
    FailFirst(u64),
}

/// An in-memory exporter with scriptable failure behavior.
#[derive(Debug)]
pub struct MockExporter {
    name: String,
    behavior: MockBehavior,
    attempts: AtomicU64,
    sent: Mutex<Vec<TelemetryBatch>>,
}

impl MockExporter {
    fn with_behavior(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            attempts: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// An exporter that acknowledges every batch.
    #[must_use]
    pub fn acking(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::Ack)
    }

    /// An exporter that fails every attempt with a retryable error.
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::FailRetryable)
    }

    /// An exporter that fails immediately with a fatal error.
    #[must_use]
    pub fn fatal(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::FailFatal)
    }

    /// An exporter whose sends never complete.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::Pending)
    }

    /// An exporter that fails the first `n` attempts, then acknowledges.
    #[must_use]
    pub fn failing_first(name: impl Into<String>, n: u64) -> Self {
        Self::with_behavior(name, MockBehavior::FailFirst(n))
    }

    /// The number of `send` calls observed so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// The batches acknowledged so far.
    #[must_use]
    pub fn sent(&self) -> Vec<TelemetryBatch> {
        self.sent.lock().expect("mock exporter lock poisoned").clone()
    }

    /// The number of batches acknowledged so far.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("mock exporter lock poisoned").len()
    }

    fn record(&self, batch: &TelemetryBatch) {
        self.sent
            .lock()
            .expect("mock exporter lock poisoned")
            .push(batch.clone());
    }
}

#[async_trait]
impl Exporter for MockExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, _kind: SignalKind) -> bool {
        true
    }

    async fn send(&self, batch: &TelemetryBatch) -> Result<(), ExportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;

        match self.behavior {
            MockBehavior::Ack => {
                self.record(batch);
                Ok(())
            }
            MockBehavior::FailRetryable => {
                Err(ExportError::Retryable("mock backend unreachable".into()))
            }
            MockBehavior::FailFatal => Err(ExportError::Fatal("mock backend misconfigured".into())),
            MockBehavior::Pending => {
                std::future::pending::<()>().await;
                Ok(())
            }
            MockBehavior::FailFirst(n) => {
                if attempt <= n {
                    Err(ExportError::Retryable("mock backend warming up".into()))
                } else {
                    self.record(batch);
                    Ok(())
                }
            }
        }
    }
}
