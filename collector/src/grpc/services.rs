//! gRPC service implementations for the export services.
//!
//! Each service follows the same shape: count received records, decode
//! each record individually (skip-and-count on failure), submit the batch,
//! and fold the outcome into a partial-success response. An overloaded
//! pipeline maps to `RESOURCE_EXHAUSTED` so well-behaved clients back off
//! and retry.

use crate::pipeline::AdmissionError;
use crate::state::AppState;
use shared::models::TelemetryBatch;
use shared::wire::conversions::{
    log_from_wire, metric_from_wire, resource_from_wire, span_from_wire,
};
use shared::wire::proto::collector::v1 as pb;
use tonic::{Request, Response, Status};

/// Submits a batch, mapping admission outcomes to gRPC semantics.
///
/// Returns the number of records to add to the rejected count (for an
/// unrouted signal), or a `Status` for a retryable overload.
async fn submit_batch(state: &AppState, batch: TelemetryBatch) -> Result<i64, Status> {
    let kind = batch.kind;
    let count = batch.len() as u64;

    match state.router().submit(batch).await {
        Ok(()) => Ok(0),
        Err(error @ AdmissionError::Overloaded(_)) => {
            state.stats().signal(kind).add_rejected(count);
            Err(Status::resource_exhausted(error.to_string()))
        }
        Err(error @ AdmissionError::Unrouted(_)) => {
            state.stats().signal(kind).add_rejected(count);
            tracing::warn!(error = %error, "batch rejected by router");
            Ok(count as i64)
        }
    }
}

fn partial_success(rejected: i64, what: &str) -> Option<pb::PartialSuccess> {
    (rejected > 0).then(|| pb::PartialSuccess {
        rejected_records: rejected,
        error_message: format!("{rejected} {what} were rejected"),
    })
}

/// Implementation of the `TraceService` gRPC service.
#[derive(Clone)]
pub struct TraceServiceImpl {
    state: AppState,
}

impl TraceServiceImpl {
    /// Creates a new `TraceServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl pb::trace_service_server::TraceService for TraceServiceImpl {
    async fn export(
        &self,
        request: Request<pb::ExportTracesRequest>,
    ) -> Result<Response<pb::ExportTracesResponse>, Status> {
        let req = request.into_inner();

        self.state
            .stats()
            .traces
            .add_received(req.spans.len() as u64);
        let resource = resource_from_wire(req.resource.as_ref());

        let mut rejected: i64 = 0;
        let mut spans = Vec::with_capacity(req.spans.len());
        for wire_span in &req.spans {
            match span_from_wire(wire_span) {
                Ok(span) => spans.push(span),
                Err(e) => {
                    rejected += 1;
                    self.state.stats().traces.add_decode_failures(1);
                    tracing::debug!(error = %e, "skipping malformed span");
                }
            }
        }

        if !spans.is_empty() {
            let batch = TelemetryBatch::spans(resource, spans);
            rejected += submit_batch(&self.state, batch).await?;
        }

        tracing::debug!(rejected, "processed gRPC trace export");
        Ok(Response::new(pb::ExportTracesResponse {
            partial_success: partial_success(rejected, "spans"),
        }))
    }
}

/// Implementation of the `LogsService` gRPC service.
#[derive(Clone)]
pub struct LogsServiceImpl {
    state: AppState,
}

impl LogsServiceImpl {
    /// Creates a new `LogsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl pb::logs_service_server::LogsService for LogsServiceImpl {
    async fn export(
        &self,
        request: Request<pb::ExportLogsRequest>,
    ) -> Result<Response<pb::ExportLogsResponse>, Status> {
        let req = request.into_inner();

        self.state.stats().logs.add_received(req.logs.len() as u64);
        let resource = resource_from_wire(req.resource.as_ref());

        let mut rejected: i64 = 0;
        let mut entries = Vec::with_capacity(req.logs.len());
        for record in &req.logs {
            match log_from_wire(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    rejected += 1;
                    self.state.stats().logs.add_decode_failures(1);
                    tracing::debug!(error = %e, "skipping malformed log record");
                }
            }
        }

        if !entries.is_empty() {
            let batch = TelemetryBatch::logs(resource, entries);
            rejected += submit_batch(&self.state, batch).await?;
        }

        tracing::debug!(rejected, "processed gRPC log export");
        Ok(Response::new(pb::ExportLogsResponse {
            partial_success: partial_success(rejected, "log records"),
        }))
    }
}

/// Implementation of the `MetricsService` gRPC service.
#[derive(Clone)]
pub struct MetricsServiceImpl {
    state: AppState,
}

impl MetricsServiceImpl {
    /// Creates a new `MetricsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl pb::metrics_service_server::MetricsService for MetricsServiceImpl {
    async fn export(
        &self,
        request: Request<pb::ExportMetricsRequest>,
    ) -> Result<Response<pb::ExportMetricsResponse>, Status> {
        let req = request.into_inner();

        self.state
            .stats()
            .metrics
            .add_received(req.metrics.len() as u64);
        let resource = resource_from_wire(req.resource.as_ref());

        let mut rejected: i64 = 0;
        let mut points = Vec::with_capacity(req.metrics.len());
        for point in &req.metrics {
            match metric_from_wire(point) {
                Ok(metric) => points.push(metric),
                Err(e) => {
                    rejected += 1;
                    self.state.stats().metrics.add_decode_failures(1);
                    tracing::debug!(error = %e, "skipping malformed metric point");
                }
            }
        }

        if !points.is_empty() {
            let batch = TelemetryBatch::metrics(resource, points);
            rejected += submit_batch(&self.state, batch).await?;
        }

        tracing::debug!(rejected, "processed gRPC metric export");
        Ok(Response::new(pb::ExportMetricsResponse {
            partial_success: partial_success(rejected, "metric points"),
        }))
    }
}
