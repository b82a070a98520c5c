//! gRPC receiver tests, driving the service implementations directly.

use crate::common::{test_app, wait_until};
use collector::grpc::{LogsServiceImpl, MetricsServiceImpl, TraceServiceImpl};
use shared::models::SignalKind;
use shared::wire::proto::collector::v1 as pb;
use shared::wire::proto::collector::v1::logs_service_server::LogsService;
use shared::wire::proto::collector::v1::metrics_service_server::MetricsService;
use shared::wire::proto::collector::v1::trace_service_server::TraceService;
use shared::wire::proto::telemetry::v1 as wire;
use tonic::Request;

fn string_value(s: &str) -> wire::AnyValue {
    wire::AnyValue {
        value: Some(wire::any_value::Value::StringValue(s.to_string())),
    }
}

fn test_resource(service: &str) -> wire::Resource {
    wire::Resource {
        attributes: vec![wire::KeyValue {
            key: "service.name".to_string(),
            value: Some(string_value(service)),
        }],
    }
}

#[tokio::test]
async fn test_grpc_trace_export() {
    let (state, mock, _pipeline) = test_app();
    let service = TraceServiceImpl::new(state);

    let request = pb::ExportTracesRequest {
        resource: Some(test_resource("grpc-service")),
        spans: vec![wire::Span {
            trace_id: (1..=16).collect(),
            span_id: (1..=8).collect(),
            parent_span_id: vec![],
            name: "rpc-op".to_string(),
            kind: wire::SpanKind::Client as i32,
            start_time_unix_nano: 1_700_000_000_000_000_000,
            end_time_unix_nano: 1_700_000_000_500_000_000,
            status: None,
            attributes: vec![],
            events: vec![],
        }],
    };

    let response = service.export(Request::new(request)).await.unwrap();
    assert!(response.into_inner().partial_success.is_none());

    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].kind, SignalKind::Trace);
    assert_eq!(mock.sent()[0].resource.service_name(), "grpc-service");
}

#[tokio::test]
async fn test_grpc_logs_export_with_partial_success() {
    let (state, mock, _pipeline) = test_app();
    let service = LogsServiceImpl::new(state.clone());

    let good = wire::LogRecord {
        time_unix_nano: 1_700_000_000_000_000_000,
        severity_number: 9,
        body: Some(string_value("good")),
        attributes: vec![],
        trace_id: vec![],
        span_id: vec![],
    };
    let bad = wire::LogRecord {
        time_unix_nano: 0,
        severity_number: 9,
        body: None, // no body: malformed
        attributes: vec![],
        trace_id: vec![],
        span_id: vec![],
    };

    let request = pb::ExportLogsRequest {
        resource: Some(test_resource("grpc-logs")),
        logs: vec![good, bad],
    };

    let response = service.export(Request::new(request)).await.unwrap();
    let partial = response.into_inner().partial_success.unwrap();
    assert_eq!(partial.rejected_records, 1);

    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].len(), 1);
    assert_eq!(state.stats().logs.decode_failures(), 1);
}

#[tokio::test]
async fn test_grpc_metrics_export() {
    let (state, mock, _pipeline) = test_app();
    let service = MetricsServiceImpl::new(state);

    let request = pb::ExportMetricsRequest {
        resource: Some(test_resource("grpc-metrics")),
        metrics: vec![wire::MetricPoint {
            name: "requests_total".to_string(),
            kind: wire::MetricKind::Counter as i32,
            time_unix_nano: 1_700_000_000_000_000_000,
            data: Some(wire::metric_point::Data::Value(7.0)),
            labels: vec![wire::KeyValue {
                key: "method".to_string(),
                value: Some(string_value("GET")),
            }],
        }],
    };

    let response = service.export(Request::new(request)).await.unwrap();
    assert!(response.into_inner().partial_success.is_none());

    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].kind, SignalKind::Metric);
}

#[tokio::test]
async fn test_grpc_overload_maps_to_resource_exhausted() {
    use collector::pipeline::PipelineRouter;
    use collector::stats::CollectorStats;
    use collector::AppState;
    use shared::models::{Resource, TelemetryBatch};
    use std::sync::Arc;
    use std::time::Duration;

    // A logs pipeline whose input channel is full and never drained.
    let mut router = PipelineRouter::new(Duration::from_millis(20));
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    router.add_pipeline(SignalKind::Log, tx.clone(), vec![]);
    tx.try_send(TelemetryBatch::logs(Resource::new(), vec![]))
        .unwrap();

    let state = AppState::new(Arc::new(router), Arc::new(CollectorStats::new()), vec![]);
    let service = LogsServiceImpl::new(state);

    let request = pb::ExportLogsRequest {
        resource: None,
        logs: vec![wire::LogRecord {
            time_unix_nano: 0,
            severity_number: 9,
            body: Some(string_value("overload")),
            attributes: vec![],
            trace_id: vec![],
            span_id: vec![],
        }],
    };

    let status = service.export(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::ResourceExhausted);
}
