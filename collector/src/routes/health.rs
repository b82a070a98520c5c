//! Health and stats endpoints.
//!
//! - `GET /health/live` - aggregate process liveness
//! - `GET /health/ready` - per-exporter readiness and aggregate status
//! - `GET /stats` - ingestion and delivery counters
//!
//! Counters and readiness are the collector's only runtime failure
//! reporting surface; producers never see more than a retry status.

use crate::state::AppState;
use crate::stats::{CollectorStatsSnapshot, ExporterState, ExporterStatsSnapshot};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    /// Always "alive" if the process can answer at all.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Seconds since startup.
    pub uptime_seconds: u64,
}

/// Readiness response with per-exporter detail.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Aggregate status: "ready", "degraded", or "unavailable".
    pub status: &'static str,
    /// Per-exporter readiness.
    pub exporters: Vec<ExporterStatsSnapshot>,
}

/// Stats response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Seconds since startup.
    pub uptime_seconds: u64,
    /// Per-signal ingestion counters.
    pub signals: CollectorStatsSnapshot,
    /// Per-exporter delivery counters.
    pub exporters: Vec<ExporterStatsSnapshot>,
}

/// Creates the health and stats routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Liveness handler: reachable means alive.
async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive",
        service: "flowgate-collector",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness handler.
///
/// Reports 503 only when every exporter is disabled: nothing could be
/// delivered anywhere. Backing-off exporters degrade the report but the
/// collector stays ready, since queues still absorb load.
async fn readiness(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let exporters = state.exporter_snapshots();

    let all_disabled = !exporters.is_empty()
        && exporters
            .iter()
            .all(|e| e.state == ExporterState::Disabled);
    let any_unhealthy = exporters.iter().any(|e| e.state != ExporterState::Healthy);

    let (code, status) = if all_disabled {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if any_unhealthy {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ready")
    };

    (code, Json(ReadinessResponse { status, exporters }))
}

/// Stats handler.
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.uptime_seconds(),
        signals: state.stats().snapshot(),
        exporters: state.exporter_snapshots(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineRouter;
    use crate::stats::CollectorStats;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(PipelineRouter::new(Duration::from_millis(100))),
            Arc::new(CollectorStats::new()),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_liveness_returns_200() {
        let app = health_routes(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "alive");
        assert_eq!(json["service"], "flowgate-collector");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_readiness_with_no_exporters_is_ready() {
        let app = health_routes(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert!(json["exporters"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_shape() {
        let state = test_state();
        state.stats().logs.add_received(7);
        state.stats().logs.add_decode_failures(2);

        let app = health_routes(state);

        let response = app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["signals"]["logs"]["received"], 7);
        assert_eq!(json["signals"]["logs"]["decode_failures"], 2);
        assert_eq!(json["signals"]["traces"]["received"], 0);
    }
}
