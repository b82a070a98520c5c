//! Per-signal pipeline worker.
//!
//! One worker task per configured signal kind. The worker pulls batches
//! from the pipeline's bounded input channel, runs the processor chain,
//! and fans every emitted batch out to all bound exporter queues. Fan-out
//! shares one `Arc` per batch across exporters; a full exporter queue
//! sheds only that exporter's delivery.

use crate::exporters::{DrainSignal, ExporterHandle};
use crate::stats::{CollectorStats, DropReason};
use shared::models::{SignalKind, TelemetryBatch};
use shared::processors::ProcessorChain;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spawns the worker for one signal kind, returning the input channel
/// receivers submit into.
pub fn spawn_pipeline(
    kind: SignalKind,
    chain: ProcessorChain,
    exporters: Vec<ExporterHandle>,
    buffer: usize,
    stats: Arc<CollectorStats>,
    drain: DrainSignal,
) -> (mpsc::Sender<TelemetryBatch>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));

    let worker = PipelineWorker {
        kind,
        chain,
        exporters,
        receiver,
        stats,
        drain,
    };

    (sender, tokio::spawn(worker.run()))
}

struct PipelineWorker {
    kind: SignalKind,
    chain: ProcessorChain,
    exporters: Vec<ExporterHandle>,
    receiver: mpsc::Receiver<TelemetryBatch>,
    stats: Arc<CollectorStats>,
    drain: DrainSignal,
}

impl PipelineWorker {
    async fn run(mut self) {
        loop {
            let deadline = self.chain.next_deadline();

            tokio::select! {
                maybe = self.receiver.recv() => match maybe {
                    Some(batch) => {
                        let emitted = self.chain.push(batch);
                        self.account_filtered();
                        self.fan_out(emitted);
                    }
                    None => break,
                },
                () = sleep_until_opt(deadline) => {
                    let emitted = self.chain.poll(Instant::now());
                    self.fan_out(emitted);
                }
                () = drain_started(self.drain.clone()) => {
                    self.drain_and_flush();
                    return;
                }
            }
        }

        // Input closed without a drain signal: flush what's buffered.
        let remaining = self.chain.flush();
        self.account_filtered();
        self.fan_out(remaining);
    }

    /// Pushes any still-queued inputs through the chain, then flushes the
    /// chain itself. Runs once when shutdown begins, before the exporters'
    /// drain deadline expires.
    fn drain_and_flush(&mut self) {
        while let Ok(batch) = self.receiver.try_recv() {
            let emitted = self.chain.push(batch);
            self.fan_out(emitted);
        }

        let remaining = self.chain.flush();
        self.account_filtered();
        self.fan_out(remaining);

        tracing::debug!(kind = %self.kind, "pipeline worker flushed for shutdown");
    }

    fn account_filtered(&mut self) {
        let filtered = self.chain.take_filtered();
        if filtered > 0 {
            self.stats.signal(self.kind).add_filtered(filtered);
        }
    }

    fn fan_out(&self, batches: Vec<TelemetryBatch>) {
        for batch in batches {
            let shared = Arc::new(batch);
            for exporter in &self.exporters {
                if !exporter.try_enqueue(&shared) {
                    exporter
                        .stats()
                        .record_dropped(DropReason::QueueFull, shared.len() as u64);
                    tracing::debug!(
                        exporter = exporter.name(),
                        kind = %self.kind,
                        records = shared.len(),
                        "exporter queue full, shedding batch"
                    );
                }
            }
        }
    }
}

/// Sleeps until the given instant; pends forever when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once a drain deadline has been announced.
async fn drain_started(mut drain: DrainSignal) {
    loop {
        if drain.borrow().is_some() {
            return;
        }
        if drain.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
