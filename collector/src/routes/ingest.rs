//! HTTP ingest endpoints.
//!
//! Accepts the Flowgate export requests over HTTP in protobuf
//! (`application/x-protobuf`) or JSON (`application/json`), detected by
//! Content-Type. Malformed individual records are skipped and counted,
//! never failing the rest of the batch; admission rejections surface as
//! 429 so producers can retry.
//!
//! # Endpoints
//!
//! - `POST /v1/traces` - Ingest trace spans
//! - `POST /v1/logs` - Ingest log records
//! - `POST /v1/metrics` - Ingest metric points

use crate::pipeline::AdmissionError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use prost::Message;
use serde::{Deserialize, Serialize};
use shared::models::TelemetryBatch;
use shared::wire::conversions::{
    log_from_wire, metric_from_wire, resource_from_wire, span_from_wire,
};
use shared::wire::proto::collector::v1 as pb;

/// Content type for protobuf requests.
const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Response for ingest requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Present when some records were rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<PartialSuccess>,
}

impl ExportResponse {
    fn with_rejected(rejected: i64, what: &str) -> Self {
        Self {
            partial_success: (rejected > 0).then(|| PartialSuccess {
                rejected_records: rejected,
                error_message: Some(format!("{rejected} {what} were rejected")),
            }),
        }
    }
}

/// Partial success information.
#[derive(Debug, Serialize, Deserialize)]
pub struct PartialSuccess {
    /// Number of rejected records.
    pub rejected_records: i64,
    /// Error message if any records were rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Error response for ingest endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestError {
    /// Error code.
    pub code: u16,
    /// Error message.
    pub message: String,
}

/// Creates the ingest routes with application state.
pub fn ingest_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/traces", post(ingest_traces))
        .route("/v1/logs", post(ingest_logs))
        .route("/v1/metrics", post(ingest_metrics))
        .with_state(state)
}

/// Determines if the request is protobuf based on Content-Type header.
fn is_protobuf(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(CONTENT_TYPE_PROTOBUF))
}

/// Decodes a request body as protobuf or JSON depending on Content-Type.
fn decode_request<T>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<T, (StatusCode, Json<IngestError>)>
where
    T: Message + Default + for<'de> Deserialize<'de>,
{
    if is_protobuf(headers) {
        T::decode(body.clone()).map_err(|e| {
            tracing::debug!(error = %e, "failed to decode protobuf request");
            (
                StatusCode::BAD_REQUEST,
                Json(IngestError {
                    code: 400,
                    message: format!("Failed to decode protobuf: {e}"),
                }),
            )
        })
    } else {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "failed to decode JSON request");
            (
                StatusCode::BAD_REQUEST,
                Json(IngestError {
                    code: 400,
                    message: format!("Failed to decode JSON: {e}"),
                }),
            )
        })
    }
}

/// Submits a batch and folds the admission outcome into the response.
///
/// Overloaded surfaces as 429 (a retryable status for the producer);
/// an unrouted signal is a counted rejection in the partial-success
/// section, never a silent drop.
async fn submit_batch(
    state: &AppState,
    batch: TelemetryBatch,
    rejected: &mut i64,
) -> Result<(), (StatusCode, Json<IngestError>)> {
    let kind = batch.kind;
    let count = batch.len() as u64;

    match state.router().submit(batch).await {
        Ok(()) => Ok(()),
        Err(error @ AdmissionError::Overloaded(_)) => {
            state.stats().signal(kind).add_rejected(count);
            Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(IngestError {
                    code: 429,
                    message: error.to_string(),
                }),
            ))
        }
        Err(error @ AdmissionError::Unrouted(_)) => {
            state.stats().signal(kind).add_rejected(count);
            *rejected += count as i64;
            tracing::warn!(error = %error, "batch rejected by router");
            Ok(())
        }
    }
}

/// Handler for trace ingestion.
async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<IngestError>)> {
    let request: pb::ExportTracesRequest = decode_request(&headers, &body)?;

    state.stats().traces.add_received(request.spans.len() as u64);
    let resource = resource_from_wire(request.resource.as_ref());

    let mut rejected: i64 = 0;
    let mut spans = Vec::with_capacity(request.spans.len());
    for wire_span in &request.spans {
        match span_from_wire(wire_span) {
            Ok(span) => spans.push(span),
            Err(e) => {
                rejected += 1;
                state.stats().traces.add_decode_failures(1);
                tracing::debug!(error = %e, "skipping malformed span");
            }
        }
    }

    if !spans.is_empty() {
        let batch = TelemetryBatch::spans(resource, spans);
        submit_batch(&state, batch, &mut rejected).await?;
    }

    tracing::debug!(rejected, "processed trace export request");
    Ok((StatusCode::OK, Json(ExportResponse::with_rejected(rejected, "spans"))))
}

/// Handler for log ingestion.
async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<IngestError>)> {
    let request: pb::ExportLogsRequest = decode_request(&headers, &body)?;

    state.stats().logs.add_received(request.logs.len() as u64);
    let resource = resource_from_wire(request.resource.as_ref());

    let mut rejected: i64 = 0;
    let mut entries = Vec::with_capacity(request.logs.len());
    for record in &request.logs {
        match log_from_wire(record) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                rejected += 1;
                state.stats().logs.add_decode_failures(1);
                tracing::debug!(error = %e, "skipping malformed log record");
            }
        }
    }

    if !entries.is_empty() {
        let batch = TelemetryBatch::logs(resource, entries);
        submit_batch(&state, batch, &mut rejected).await?;
    }

    tracing::debug!(rejected, "processed log export request");
    Ok((StatusCode::OK, Json(ExportResponse::with_rejected(rejected, "log records"))))
}

/// Handler for metric ingestion.
async fn ingest_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportResponse>), (StatusCode, Json<IngestError>)> {
    let request: pb::ExportMetricsRequest = decode_request(&headers, &body)?;

    state
        .stats()
        .metrics
        .add_received(request.metrics.len() as u64);
    let resource = resource_from_wire(request.resource.as_ref());

    let mut rejected: i64 = 0;
    let mut points = Vec::with_capacity(request.metrics.len());
    for point in &request.metrics {
        match metric_from_wire(point) {
            Ok(metric) => points.push(metric),
            Err(e) => {
                rejected += 1;
                state.stats().metrics.add_decode_failures(1);
                tracing::debug!(error = %e, "skipping malformed metric point");
            }
        }
    }

    if !points.is_empty() {
        let batch = TelemetryBatch::metrics(resource, points);
        submit_batch(&state, batch, &mut rejected).await?;
    }

    tracing::debug!(rejected, "processed metric export request");
    Ok((StatusCode::OK, Json(ExportResponse::with_rejected(rejected, "metric points"))))
}
