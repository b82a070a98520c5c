//! Row-forwarding receiver tests over a real TCP connection.

use crate::common::{test_app, wait_until};
use collector::forward::{run_forward_listener, ForwardOptions};
use shared::models::{Record, SignalKind};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

async fn start_listener(
    state: collector::AppState,
    options: ForwardOptions,
) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(run_forward_listener(listener, state, options, shutdown_rx));

    (addr, shutdown_tx)
}

#[tokio::test]
async fn test_forward_rows_reach_exporter() {
    let (state, mock, _pipeline) = test_app();
    let options = ForwardOptions {
        max_batch_lines: 64,
        flush_idle: Duration::from_millis(20),
    };
    let (addr, _shutdown_tx) = start_listener(state.clone(), options).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"plain text row\n{\"level\":\"error\",\"message\":\"structured row\"}\n")
        .await
        .unwrap();
    stream.flush().await.unwrap();

    // Idle flush groups both rows into one log batch.
    wait_until(|| mock.sent_count() >= 1).await;

    let batches = mock.sent();
    let total: usize = batches.iter().map(shared::models::TelemetryBatch::len).sum();
    assert_eq!(total, 2);
    assert!(batches.iter().all(|b| b.kind == SignalKind::Log));
    assert_eq!(state.stats().logs.snapshot().received, 2);

    match &batches[0].records[0] {
        Record::Log(log) => assert_eq!(log.body.as_text(), Some("plain text row")),
        other => panic!("unexpected record: {other:?}"),
    }
}

#[tokio::test]
async fn test_forward_size_threshold_flushes_immediately() {
    let (state, mock, _pipeline) = test_app();
    let options = ForwardOptions {
        max_batch_lines: 2,
        flush_idle: Duration::from_secs(30),
    };
    let (addr, _shutdown_tx) = start_listener(state, options).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"one\ntwo\n").await.unwrap();
    stream.flush().await.unwrap();

    // Two rows hit the size threshold without waiting for idle time.
    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].len(), 2);
}

#[tokio::test]
async fn test_forward_connection_close_flushes_partial_group() {
    let (state, mock, _pipeline) = test_app();
    let options = ForwardOptions {
        max_batch_lines: 64,
        flush_idle: Duration::from_secs(30),
    };
    let (addr, _shutdown_tx) = start_listener(state, options).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"only row\n").await.unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);

    wait_until(|| mock.sent_count() == 1).await;
    assert_eq!(mock.sent()[0].len(), 1);
    assert_eq!(
        mock.sent()[0].resource.get_str("telemetry.receiver"),
        Some("forward")
    );
}
