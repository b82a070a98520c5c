//! HTTP ingest tests: end-to-end from the axum router through the
//! pipeline to a mock backend.

use crate::common::{get, post_json, post_protobuf, test_app, wait_until};
use axum::http::StatusCode;
use collector::create_router;
use prost::Message;
use serde_json::json;
use shared::models::SignalKind;
use shared::wire::proto::collector::v1 as pb;
use shared::wire::proto::telemetry::v1 as wire;

fn string_value(s: &str) -> wire::AnyValue {
    wire::AnyValue {
        value: Some(wire::any_value::Value::StringValue(s.to_string())),
    }
}

#[tokio::test]
async fn test_ingest_logs_json_end_to_end() {
    let (state, mock, _pipeline) = test_app();
    let app = create_router(state.clone(), 1024 * 1024);

    let body = json!({
        "resource": {
            "attributes": [{
                "key": "service.name",
                "value": {"stringValue": "test-service"}
            }]
        },
        "logs": [
            {
                "timeUnixNano": "1700000000000000000",
                "severityNumber": 9,
                "body": {"stringValue": "first"}
            },
            {
                "timeUnixNano": "1700000000000000001",
                "severityNumber": 17,
                "body": {"stringValue": "second"}
            }
        ]
    });

    let (status, response) = post_json(app, "/v1/logs", body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(response.get("partial_success").is_none());

    wait_until(|| mock.sent_count() == 1).await;
    let batch = &mock.sent()[0];
    assert_eq!(batch.kind, SignalKind::Log);
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.resource.service_name(), "test-service");
    assert_eq!(state.stats().logs.snapshot().received, 2);
}

#[tokio::test]
async fn test_ingest_traces_protobuf_end_to_end() {
    let (state, mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let request = pb::ExportTracesRequest {
        resource: Some(wire::Resource {
            attributes: vec![wire::KeyValue {
                key: "service.name".to_string(),
                value: Some(string_value("trace-service")),
            }],
        }),
        spans: vec![wire::Span {
            trace_id: (1..=16).collect(),
            span_id: (1..=8).collect(),
            parent_span_id: vec![],
            name: "GET /users".to_string(),
            kind: wire::SpanKind::Server as i32,
            start_time_unix_nano: 1_700_000_000_000_000_000,
            end_time_unix_nano: 1_700_000_001_000_000_000,
            status: Some(wire::SpanStatus {
                code: wire::StatusCode::Ok as i32,
                message: String::new(),
            }),
            attributes: vec![],
            events: vec![],
        }],
    };

    let (status, _) = post_protobuf(app, "/v1/traces", request.encode_to_vec()).await;

    assert_eq!(status, StatusCode::OK);
    wait_until(|| mock.sent_count() == 1).await;
    let batch = &mock.sent()[0];
    assert_eq!(batch.kind, SignalKind::Trace);
    assert_eq!(batch.resource.service_name(), "trace-service");
}

#[tokio::test]
async fn test_malformed_records_partial_success() {
    let (state, mock, _pipeline) = test_app();
    let app = create_router(state.clone(), 1024 * 1024);

    // Two good records around one with an invalid trace id.
    let good = |name: &str| wire::Span {
        trace_id: (1..=16).collect(),
        span_id: (1..=8).collect(),
        parent_span_id: vec![],
        name: name.to_string(),
        kind: 0,
        start_time_unix_nano: 1,
        end_time_unix_nano: 2,
        status: None,
        attributes: vec![],
        events: vec![],
    };
    let mut bad = good("bad");
    bad.trace_id = vec![0xAB];

    let request = pb::ExportTracesRequest {
        resource: None,
        spans: vec![good("a"), bad, good("b")],
    };

    let (status, response) = post_protobuf(app, "/v1/traces", request.encode_to_vec()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["partial_success"]["rejected_records"], 1);

    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].len(), 2);
    assert_eq!(state.stats().traces.decode_failures(), 1);
}

#[tokio::test]
async fn test_ingest_metrics_json_end_to_end() {
    let (state, mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let body = json!({
        "metrics": [{
            "name": "cpu_usage",
            "kind": "METRIC_KIND_GAUGE",
            "timeUnixNano": "1700000000000000000",
            "value": 0.75,
            "labels": [{"key": "host", "value": {"stringValue": "node-1"}}]
        }]
    });

    let (status, _) = post_json(app, "/v1/metrics", body).await;

    assert_eq!(status, StatusCode::OK);
    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].kind, SignalKind::Metric);
}

#[tokio::test]
async fn test_invalid_body_returns_400() {
    let (state, _mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let (status, response) = post_json(app, "/v1/logs", json!("not an object")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 400);
}

#[tokio::test]
async fn test_counters_visible_in_stats_endpoint() {
    let (state, mock, _pipeline) = test_app();
    let app = create_router(state, 1024 * 1024);

    let body = json!({
        "logs": [{"severityNumber": 9, "body": {"stringValue": "counted"}}]
    });
    let (status, _) = post_json(app.clone(), "/v1/logs", body).await;
    assert_eq!(status, StatusCode::OK);

    wait_until(|| mock.sent_count() == 1).await;

    let (status, stats) = get(app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["signals"]["logs"]["received"], 1);
    assert_eq!(stats["signals"]["logs"]["decode_failures"], 0);

    let exporters = stats["exporters"].as_array().unwrap();
    assert_eq!(exporters.len(), 1);
    assert_eq!(exporters[0]["name"], "mock");
    assert_eq!(exporters[0]["exported_records"], 1);
}
