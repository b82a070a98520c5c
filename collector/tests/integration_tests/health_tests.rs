//! Health and readiness integration tests.

use crate::common::{build_pipeline, fast_retry, get, test_app, wait_until};
use axum::http::StatusCode;
use collector::create_router;
use collector::exporters::MockExporter;
use collector::stats::ExporterState;
use shared::models::{LogBody, LogEntry, LogLevel, Resource, TelemetryBatch};
use std::sync::Arc;

fn log_batch() -> TelemetryBatch {
    TelemetryBatch::logs(
        Resource::new(),
        vec![LogEntry::new(LogLevel::Info, LogBody::text("x"))],
    )
}

#[tokio::test]
async fn test_liveness_always_alive() {
    let (state, _mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let (status, response) = get(app, "/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "alive");
    assert_eq!(response["service"], "flowgate-collector");
}

#[tokio::test]
async fn test_readiness_healthy_pipeline() {
    let (state, _mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let (status, response) = get(app, "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "ready");
    assert_eq!(response["exporters"][0]["state"], "healthy");
}

#[tokio::test]
async fn test_readiness_degrades_while_backing_off() {
    let failing = Arc::new(MockExporter::failing("down"));
    let pipeline = build_pipeline(vec![(failing, fast_retry(50))]);

    pipeline.state.router().submit(log_batch()).await.unwrap();

    let handle = pipeline.state.exporters()[0].clone();
    wait_until(|| handle.stats().state() == ExporterState::BackingOff).await;

    let app = create_router(pipeline.state.clone(), 1024 * 1024);
    let (status, response) = get(app, "/health/ready").await;

    // Backing off degrades the report but the collector stays ready.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "degraded");
    assert_eq!(response["exporters"][0]["state"], "backing-off");
}

#[tokio::test]
async fn test_readiness_unavailable_when_all_exporters_disabled() {
    let fatal = Arc::new(MockExporter::fatal("broken"));
    let pipeline = build_pipeline(vec![(fatal, fast_retry(3))]);

    pipeline.state.router().submit(log_batch()).await.unwrap();

    let handle = pipeline.state.exporters()[0].clone();
    wait_until(|| handle.stats().state() == ExporterState::Disabled).await;

    let app = create_router(pipeline.state.clone(), 1024 * 1024);
    let (status, response) = get(app, "/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["status"], "unavailable");
}

#[tokio::test]
async fn test_stats_reports_queue_depth() {
    let pending = Arc::new(MockExporter::pending("hung"));
    let pipeline = build_pipeline(vec![(pending, fast_retry(3))]);

    for _ in 0..3 {
        pipeline.state.router().submit(log_batch()).await.unwrap();
    }

    let handle = pipeline.state.exporters()[0].clone();
    wait_until(|| handle.queue_depth() >= 2).await;

    let app = create_router(pipeline.state.clone(), 1024 * 1024);
    let (status, response) = get(app, "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert!(response["exporters"][0]["queue_depth"].as_u64().unwrap() >= 2);
}
