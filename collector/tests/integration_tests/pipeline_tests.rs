//! Pipeline behavior tests: exporter isolation, backpressure, and the
//! shutdown drain window.

use crate::common::{build_pipeline, build_pipeline_with_capacity, fast_retry, wait_until};
use collector::exporters::MockExporter;
use collector::pipeline::AdmissionError;
use collector::stats::DropReason;
use shared::models::{LogBody, LogEntry, LogLevel, Resource, SignalKind, TelemetryBatch};
use std::sync::Arc;
use std::time::Duration;

fn log_batch(count: usize) -> TelemetryBatch {
    let logs = (0..count)
        .map(|i| LogEntry::new(LogLevel::Info, LogBody::text(format!("line {i}"))))
        .collect();
    TelemetryBatch::logs(
        Resource::new().with_attribute("service.name", "test-app"),
        logs,
    )
}

#[tokio::test]
async fn test_failing_exporter_does_not_block_sibling() {
    // E1 fails every attempt; E2 acknowledges. Same pipeline.
    let failing = Arc::new(MockExporter::failing("e1"));
    let acking = Arc::new(MockExporter::acking("e2"));

    let pipeline = build_pipeline(vec![
        (failing.clone(), fast_retry(3)),
        (acking.clone(), fast_retry(3)),
    ]);

    for _ in 0..5 {
        pipeline.state.router().submit(log_batch(2)).await.unwrap();
    }

    // Every batch reaches E2 despite E1's sustained failures.
    wait_until(|| acking.sent_count() == 5).await;
    assert_eq!(failing.sent_count(), 0);

    // E1 eventually drops each batch after exhausting retries.
    let e1_stats = pipeline
        .state
        .exporters()
        .iter()
        .find(|h| h.name() == "e1")
        .unwrap()
        .stats()
        .clone();
    wait_until(|| e1_stats.dropped(DropReason::RetryExhausted) == 10).await;

    // E2 delivered every record.
    let e2_stats = pipeline
        .state
        .exporters()
        .iter()
        .find(|h| h.name() == "e2")
        .unwrap()
        .stats()
        .clone();
    assert_eq!(e2_stats.exported_records(), 10);
}

#[tokio::test]
async fn test_queue_capacity_n_plus_one_rejected() {
    // A backend that never responds, with queue capacity N.
    const N: usize = 3;
    let pending = Arc::new(MockExporter::pending("hung"));
    let pipeline = build_pipeline_with_capacity(vec![(pending, fast_retry(3))], N);

    let handle = pipeline.state.exporters()[0].clone();

    // The worker pulls one batch into its in-flight delivery attempt;
    // wait for that so the queue has its full capacity available.
    pipeline.state.router().submit(log_batch(1)).await.unwrap();
    wait_until(|| handle.queue_depth() == 0).await;

    // N submissions fill the queue without draining.
    for _ in 0..N {
        pipeline.state.router().submit(log_batch(1)).await.unwrap();
    }
    wait_until(|| handle.is_full()).await;

    // The (N+1)th submission is rejected with a retryable admission
    // status: not silently dropped, not blocked forever.
    let started = std::time::Instant::now();
    let result = pipeline.state.router().submit(log_batch(1)).await;
    assert!(started.elapsed() < Duration::from_secs(1));

    match result {
        Err(error @ AdmissionError::Overloaded(SignalKind::Log)) => {
            assert!(error.is_retryable());
        }
        other => panic!("expected Overloaded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_drain_deadline_with_unresponsive_backend() {
    let pending = Arc::new(MockExporter::pending("hung"));
    let pipeline = build_pipeline(vec![(pending, fast_retry(5))]);

    for _ in 0..3 {
        pipeline.state.router().submit(log_batch(2)).await.unwrap();
    }

    let handle = pipeline.state.exporters()[0].clone();
    wait_until(|| handle.queue_depth() >= 2).await;

    // Announce a drain deadline; the backend never responds, so every
    // record must be counted as dropped and shutdown must complete
    // within the deadline plus a bounded margin.
    let drain = Duration::from_millis(250);
    let started = std::time::Instant::now();
    pipeline
        .drain_tx
        .send(Some(tokio::time::Instant::now() + drain))
        .unwrap();

    wait_until(|| handle.stats().dropped(DropReason::Shutdown) == 6).await;
    assert!(started.elapsed() < drain + Duration::from_secs(1));
    assert_eq!(handle.stats().exported_records(), 0);
}

#[tokio::test]
async fn test_fatal_backend_disables_only_itself() {
    let fatal = Arc::new(MockExporter::fatal("broken"));
    let acking = Arc::new(MockExporter::acking("ok"));

    let pipeline = build_pipeline(vec![
        (fatal.clone(), fast_retry(3)),
        (acking.clone(), fast_retry(3)),
    ]);

    for _ in 0..4 {
        pipeline.state.router().submit(log_batch(1)).await.unwrap();
    }

    wait_until(|| acking.sent_count() == 4).await;

    // The fatal exporter attempted exactly once, then dropped the rest
    // while disabled.
    let broken_stats = pipeline
        .state
        .exporters()
        .iter()
        .find(|h| h.name() == "broken")
        .unwrap()
        .stats()
        .clone();
    wait_until(|| broken_stats.dropped(DropReason::Disabled) == 4).await;
    assert_eq!(fatal.attempts(), 1);
}

#[tokio::test]
async fn test_fifo_order_within_one_exporter() {
    let acking = Arc::new(MockExporter::acking("ordered"));
    let pipeline = build_pipeline(vec![(acking.clone(), fast_retry(3))]);

    for i in 0..5 {
        let batch = TelemetryBatch::logs(
            Resource::new(),
            vec![LogEntry::new(LogLevel::Info, LogBody::text(format!("batch {i}")))],
        );
        pipeline.state.router().submit(batch).await.unwrap();
    }

    wait_until(|| acking.sent_count() == 5).await;

    let sent = acking.sent();
    for (i, batch) in sent.iter().enumerate() {
        match &batch.records[0] {
            shared::models::Record::Log(log) => {
                assert_eq!(log.body.as_text(), Some(format!("batch {i}").as_str()));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
