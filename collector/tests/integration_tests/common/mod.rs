//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration
//! tests: wiring a full pipeline against mock exporters and HTTP request
//! helpers driving the axum router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use collector::exporters::{spawn_exporter, Exporter, ExporterHandle, ExporterOptions, MockExporter};
use collector::pipeline::{spawn_pipeline, PipelineRouter};
use collector::stats::{CollectorStats, ExporterStats};
use collector::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::config::RetryConfig;
use shared::models::SignalKind;
use shared::processors::ProcessorChain;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default queue capacity used by test pipelines.
pub const TEST_QUEUE_CAPACITY: usize = 16;

/// A fully wired test pipeline: one pipeline per signal kind, each bound
/// to the same set of exporters.
pub struct TestPipeline {
    /// State for receivers and routes.
    pub state: AppState,
    /// Shutdown drain sender, kept alive for the test's duration.
    pub drain_tx: watch::Sender<Option<tokio::time::Instant>>,
}

/// Fast retry settings so failure tests finish quickly.
#[must_use]
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_ms: 1,
        max_ms: 5,
    }
}

/// Wires the given exporters into pipelines for all three signal kinds.
#[must_use]
pub fn build_pipeline(exporters: Vec<(Arc<dyn Exporter>, RetryConfig)>) -> TestPipeline {
    build_pipeline_with_capacity(exporters, TEST_QUEUE_CAPACITY)
}

/// Same as [`build_pipeline`] with an explicit exporter queue capacity.
#[must_use]
pub fn build_pipeline_with_capacity(
    exporters: Vec<(Arc<dyn Exporter>, RetryConfig)>,
    queue_capacity: usize,
) -> TestPipeline {
    let (drain_tx, drain_rx) = watch::channel(None);
    let stats = Arc::new(CollectorStats::new());

    let handles: Vec<ExporterHandle> = exporters
        .into_iter()
        .map(|(exporter, retry)| {
            let exporter_stats = Arc::new(ExporterStats::new(exporter.name().to_string()));
            let (handle, _task) = spawn_exporter(
                exporter,
                ExporterOptions {
                    queue_capacity,
                    retry,
                },
                exporter_stats,
                drain_rx.clone(),
            );
            handle
        })
        .collect();

    let mut router = PipelineRouter::new(Duration::from_millis(100));
    for kind in SignalKind::ALL {
        let (input, _task) = spawn_pipeline(
            kind,
            ProcessorChain::default(),
            handles.clone(),
            8,
            stats.clone(),
            drain_rx.clone(),
        );
        router.add_pipeline(kind, input, handles.clone());
    }

    TestPipeline {
        state: AppState::new(Arc::new(router), stats, handles),
        drain_tx,
    }
}

/// Builds a state with a single acking mock exporter behind all three
/// signal kinds.
#[must_use]
pub fn test_app() -> (AppState, Arc<MockExporter>, TestPipeline) {
    let mock = Arc::new(MockExporter::acking("mock"));
    let pipeline = build_pipeline(vec![(mock.clone(), fast_retry(3))]);
    (pipeline.state.clone(), mock, pipeline)
}

/// Polls until the condition holds or a bounded number of attempts pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Helper to make a POST request with JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request with a protobuf body.
pub async fn post_protobuf(app: Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-protobuf")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
