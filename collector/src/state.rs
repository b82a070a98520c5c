//! Application state module.
//!
//! Defines the shared state handed to receivers and route handlers: the
//! pipeline router, the collector counters, and the exporter handles used
//! for readiness reporting.

use crate::exporters::ExporterHandle;
use crate::pipeline::PipelineRouter;
use crate::stats::{CollectorStats, ExporterStatsSnapshot};
use std::sync::Arc;
use std::time::Instant;

/// State shared across all receivers and request handlers.
#[derive(Clone)]
pub struct AppState {
    router: Arc<PipelineRouter>,
    stats: Arc<CollectorStats>,
    exporters: Vec<ExporterHandle>,
    started_at: Instant,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub fn new(
        router: Arc<PipelineRouter>,
        stats: Arc<CollectorStats>,
        mut exporters: Vec<ExporterHandle>,
    ) -> Self {
        // Deterministic order for readiness and stats responses.
        exporters.sort_by(|a, b| a.name().cmp(b.name()));

        Self {
            router,
            stats,
            exporters,
            started_at: Instant::now(),
        }
    }

    /// Returns the pipeline router.
    #[must_use]
    pub fn router(&self) -> &PipelineRouter {
        &self.router
    }

    /// Returns the collector counters.
    #[must_use]
    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Returns the exporter handles, sorted by name.
    #[must_use]
    pub fn exporters(&self) -> &[ExporterHandle] {
        &self.exporters
    }

    /// Takes a snapshot of every exporter's counters and queue depth.
    #[must_use]
    pub fn exporter_snapshots(&self) -> Vec<ExporterStatsSnapshot> {
        self.exporters
            .iter()
            .map(|handle| handle.stats().snapshot(handle.queue_depth()))
            .collect()
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
