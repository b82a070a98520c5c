//! Per-exporter worker.
//!
//! Each exporter owns a bounded queue drained by exactly one worker task.
//! The worker retries transient failures with jittered exponential
//! backoff, converts exhausted retries into counted drops, disables the
//! exporter permanently on a fatal error, and honors the shutdown drain
//! deadline so the process never blocks indefinitely on a dead backend.

use super::Exporter;
use crate::exporters::ExportError;
use crate::stats::{DropReason, ExporterState, ExporterStats};
use shared::config::{ExporterConfig, RetryConfig};
use shared::models::TelemetryBatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Watch channel carrying the shutdown drain deadline. `None` while the
/// collector is running; set once when shutdown begins.
pub type DrainSignal = watch::Receiver<Option<Instant>>;

/// Worker tuning taken from the exporter configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExporterOptions {
    /// Capacity of the bounded queue, in batches.
    pub queue_capacity: usize,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl From<&ExporterConfig> for ExporterOptions {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            retry: config.retry,
        }
    }
}

/// Handle for enqueuing batches to one exporter's queue.
///
/// Cloneable; every pipeline bound to the exporter holds one. The queue
/// itself is only ever drained by the worker task.
#[derive(Debug, Clone)]
pub struct ExporterHandle {
    sender: mpsc::Sender<Arc<TelemetryBatch>>,
    stats: Arc<ExporterStats>,
}

impl ExporterHandle {
    /// The exporter name from configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        self.stats.name()
    }

    /// The exporter's delivery counters and state.
    #[must_use]
    pub fn stats(&self) -> &Arc<ExporterStats> {
        &self.stats
    }

    /// Attempts to enqueue a batch without waiting. Returns false when the
    /// queue is full; the caller decides how to account for the shed load.
    #[must_use]
    pub fn try_enqueue(&self, batch: &Arc<TelemetryBatch>) -> bool {
        self.sender.try_send(Arc::clone(batch)).is_ok()
    }

    /// The number of batches currently queued.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Returns true if the queue has no free slots.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.sender.capacity() == 0
    }
}

/// Spawns a worker task for the exporter and returns its queue handle.
pub fn spawn_exporter(
    exporter: Arc<dyn Exporter>,
    options: ExporterOptions,
    stats: Arc<ExporterStats>,
    drain: DrainSignal,
) -> (ExporterHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(options.queue_capacity);

    let worker = ExporterWorker {
        exporter,
        receiver,
        stats: Arc::clone(&stats),
        retry: options.retry,
        drain,
        disabled: false,
    };

    let task = tokio::spawn(worker.run());

    (ExporterHandle { sender, stats }, task)
}

/// Outcome of delivering one batch, including retries.
enum DeliveryOutcome {
    Delivered,
    RetriesExhausted(String),
    Fatal(String),
    DrainExpired,
}

struct ExporterWorker {
    exporter: Arc<dyn Exporter>,
    receiver: mpsc::Receiver<Arc<TelemetryBatch>>,
    stats: Arc<ExporterStats>,
    retry: RetryConfig,
    drain: DrainSignal,
    disabled: bool,
}

impl ExporterWorker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe = self.receiver.recv() => match maybe {
                    Some(batch) => self.handle(batch).await,
                    None => break,
                },
                () = drain_expired(self.drain.clone()) => {
                    self.discard_remaining();
                    break;
                }
            }
        }

        tracing::debug!(exporter = self.stats.name(), "exporter worker stopped");
    }

    async fn handle(&mut self, batch: Arc<TelemetryBatch>) {
        let records = batch.len() as u64;

        if self.disabled {
            self.stats.record_dropped(DropReason::Disabled, records);
            return;
        }

        match self.deliver(&batch).await {
            DeliveryOutcome::Delivered => {
                self.stats.record_exported(records);
                self.stats.set_state(ExporterState::Healthy);
            }
            DeliveryOutcome::RetriesExhausted(error) => {
                self.stats.record_dropped(DropReason::RetryExhausted, records);
                tracing::warn!(
                    exporter = self.stats.name(),
                    records,
                    %error,
                    "dropping batch after exhausting retries"
                );
            }
            DeliveryOutcome::Fatal(error) => {
                // Reported once; later batches are counted silently.
                self.disabled = true;
                self.stats.set_state(ExporterState::Disabled);
                self.stats.record_dropped(DropReason::Disabled, records);
                tracing::error!(
                    exporter = self.stats.name(),
                    %error,
                    "fatal export error, exporter disabled for process lifetime"
                );
            }
            DeliveryOutcome::DrainExpired => {
                self.stats.record_dropped(DropReason::Shutdown, records);
            }
        }
    }

    async fn deliver(&mut self, batch: &TelemetryBatch) -> DeliveryOutcome {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if self.drain_deadline_passed() {
                return DeliveryOutcome::DrainExpired;
            }

            let result = {
                let send = self.exporter.send(batch);
                tokio::select! {
                    result = send => result,
                    () = drain_expired(self.drain.clone()) => {
                        return DeliveryOutcome::DrainExpired;
                    }
                }
            };

            match result {
                Ok(()) => return DeliveryOutcome::Delivered,
                Err(ExportError::Fatal(error)) => return DeliveryOutcome::Fatal(error),
                Err(ExportError::Retryable(error)) => {
                    self.stats.set_state(ExporterState::BackingOff);

                    if attempt >= self.retry.max_attempts.max(1) {
                        return DeliveryOutcome::RetriesExhausted(error);
                    }

                    self.stats.record_retry();
                    let delay = backoff_delay(attempt, &self.retry);
                    tracing::debug!(
                        exporter = self.stats.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "retrying export after backoff"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = drain_expired(self.drain.clone()) => {
                            return DeliveryOutcome::DrainExpired;
                        }
                    }
                }
            }
        }
    }

    fn drain_deadline_passed(&self) -> bool {
        self.drain
            .borrow()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn discard_remaining(&mut self) {
        while let Ok(batch) = self.receiver.try_recv() {
            self.stats
                .record_dropped(DropReason::Shutdown, batch.len() as u64);
        }
    }
}

/// Resolves once the drain deadline has passed. Pends forever while no
/// deadline is set.
async fn drain_expired(mut drain: DrainSignal) {
    loop {
        let deadline = *drain.borrow();
        match deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                return;
            }
            None => {
                if drain.changed().await.is_err() {
                    // Sender gone without ever setting a deadline; there
                    // will be no drain phase.
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

/// Exponential backoff with jitter.
///
/// `attempt` is 1-based: the delay after the first failed attempt is
/// roughly `base_ms`, doubling per attempt up to `max_ms`, plus 0-10%
/// jitter.
fn backoff_delay(attempt: u32, retry: &RetryConfig) -> Duration {
    use rand::Rng;

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let capped = retry.base_ms.saturating_mul(exponent).min(retry.max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
