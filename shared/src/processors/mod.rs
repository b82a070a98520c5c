//! Batch processors.
//!
//! A processor takes a [`TelemetryBatch`] and yields zero or more batches:
//! it may shrink (filter), enrich (resource attributes), or coalesce
//! (batcher) its input. Processors execute strictly in the order they are
//! declared in the pipeline configuration; each processor's output is the
//! next one's input.
//!
//! Processors are a tagged enum rather than a trait object so the dispatch
//! per kind stays explicit and exhaustive.

mod batcher;
mod enrich;
mod filter;

pub use batcher::Batcher;
pub use enrich::ResourceEnricher;
pub use filter::{FilterMode, FilterRule, RecordFilter};

use crate::config::ProcessorConfig;
use crate::models::TelemetryBatch;
use std::time::{Duration, Instant};

/// A single processor stage.
#[derive(Debug)]
pub enum Processor {
    /// Coalesces records up to a size or age threshold.
    Batch(Batcher),
    /// Merges static attributes into the batch resource.
    Enrich(ResourceEnricher),
    /// Drops records matching (or not matching) attribute rules.
    Filter(RecordFilter),
}

impl Processor {
    /// Builds a processor from its configuration.
    #[must_use]
    pub fn from_config(config: &ProcessorConfig) -> Self {
        match config {
            ProcessorConfig::Batch {
                max_records,
                max_age_ms,
            } => Self::Batch(Batcher::new(*max_records, Duration::from_millis(*max_age_ms))),
            ProcessorConfig::Enrich { attributes } => {
                Self::Enrich(ResourceEnricher::new(attributes.clone()))
            }
            ProcessorConfig::Filter { mode, rules } => {
                Self::Filter(RecordFilter::new(*mode, rules.clone()))
            }
        }
    }

    /// Feeds a batch into this processor, returning any batches it emits.
    pub fn push(&mut self, batch: TelemetryBatch) -> Vec<TelemetryBatch> {
        match self {
            Self::Batch(b) => b.push(batch),
            Self::Enrich(e) => vec![e.apply(batch)],
            Self::Filter(f) => f.apply(batch).into_iter().collect(),
        }
    }

    /// Emits any batches whose age threshold has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<TelemetryBatch> {
        match self {
            Self::Batch(b) => b.poll(now),
            Self::Enrich(_) | Self::Filter(_) => Vec::new(),
        }
    }

    /// Emits everything still buffered. Called once on shutdown.
    pub fn flush(&mut self) -> Vec<TelemetryBatch> {
        match self {
            Self::Batch(b) => b.flush(),
            Self::Enrich(_) | Self::Filter(_) => Vec::new(),
        }
    }

    /// The next instant at which [`Self::poll`] may emit something.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self {
            Self::Batch(b) => b.next_deadline(),
            Self::Enrich(_) | Self::Filter(_) => None,
        }
    }

    /// A short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Batch(_) => "batch",
            Self::Enrich(_) => "enrich",
            Self::Filter(_) => "filter",
        }
    }
}

/// An ordered chain of processors.
///
/// The declared order is preserved exactly; no reordering is applied.
/// Empty batches are swallowed at every boundary so they never reach
/// exporters.
#[derive(Debug, Default)]
pub struct ProcessorChain {
    stages: Vec<Processor>,
}

impl ProcessorChain {
    /// Creates a chain from already-built stages.
    #[must_use]
    pub fn new(stages: Vec<Processor>) -> Self {
        Self { stages }
    }

    /// Builds a chain from processor configurations, in declared order.
    #[must_use]
    pub fn from_configs(configs: &[ProcessorConfig]) -> Self {
        Self {
            stages: configs.iter().map(Processor::from_config).collect(),
        }
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs a batch through the full chain, returning the emitted batches.
    pub fn push(&mut self, batch: TelemetryBatch) -> Vec<TelemetryBatch> {
        if batch.is_empty() {
            return Vec::new();
        }
        self.run_from(0, vec![batch])
    }

    /// Emits age-triggered batches from every stage, running each emission
    /// through the remainder of the chain.
    pub fn poll(&mut self, now: Instant) -> Vec<TelemetryBatch> {
        let mut out = Vec::new();
        for i in 0..self.stages.len() {
            let emitted = self.stages[i].poll(now);
            if !emitted.is_empty() {
                out.extend(self.run_from(i + 1, emitted));
            }
        }
        out
    }

    /// Flushes everything still buffered through the rest of the chain.
    /// Called once on shutdown.
    pub fn flush(&mut self) -> Vec<TelemetryBatch> {
        let mut out = Vec::new();
        for i in 0..self.stages.len() {
            let emitted = self.stages[i].flush();
            if !emitted.is_empty() {
                out.extend(self.run_from(i + 1, emitted));
            }
        }
        out
    }

    /// The earliest instant at which any stage may emit on [`Self::poll`].
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.stages.iter().filter_map(Processor::next_deadline).min()
    }

    /// Drains the number of records dropped by filter stages since the
    /// last call.
    pub fn take_filtered(&mut self) -> u64 {
        self.stages
            .iter_mut()
            .map(|stage| match stage {
                Processor::Filter(f) => f.take_dropped(),
                Processor::Batch(_) | Processor::Enrich(_) => 0,
            })
            .sum()
    }

    fn run_from(&mut self, start: usize, batches: Vec<TelemetryBatch>) -> Vec<TelemetryBatch> {
        let mut current = batches;
        let stage_count = self.stages.len();
        for stage in &mut self.stages[start.min(stage_count)..] {
            let mut next = Vec::new();
            for batch in current {
                if !batch.is_empty() {
                    next.extend(stage.push(batch));
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current.retain(|b| !b.is_empty());
        current
    }
}
