//! Flowgate Collector
//!
//! This crate provides the Flowgate telemetry collector daemon: protocol
//! receivers (gRPC, HTTP protobuf/JSON, row-forwarding), per-signal
//! processing pipelines, and per-backend exporter fan-out with independent
//! queues and retries.
//!
//! # Architecture
//!
//! Receivers decode inbound telemetry into a common batch model and
//! submit it to the pipeline router. Each signal kind (traces, logs,
//! metrics) runs its own pipeline worker executing the configured
//! processor chain; every processed batch is fanned out to all bound
//! exporter queues. Exporters deliver independently, so one backend's
//! failure never blocks another's deliveries.
//!
//! # Example
//!
//! ```no_run
//! use collector::run_collector;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_collector().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod exporters;
pub mod forward;
pub mod grpc;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod stats;

pub use config::Config;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use exporters::{build_exporter, spawn_exporter, ExporterHandle, ExporterOptions};
use pipeline::{spawn_pipeline, PipelineRouter};
use shared::config::CollectorConfig;
use shared::processors::ProcessorChain;
use shared::wire::proto::collector::v1::logs_service_server::LogsServiceServer;
use shared::wire::proto::collector::v1::metrics_service_server::MetricsServiceServer;
use shared::wire::proto::collector::v1::trace_service_server::TraceServiceServer;
use stats::{CollectorStats, ExporterStats};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// A running set of pipelines and exporter workers.
///
/// Construct with [`Collector::start`] from a validated configuration,
/// then serve receivers against [`Collector::app_state`]. Call
/// [`Collector::shutdown`] to flush processor chains and drain exporter
/// queues under a bounded deadline.
pub struct Collector {
    router: Arc<PipelineRouter>,
    stats: Arc<CollectorStats>,
    handles: Vec<ExporterHandle>,
    pipeline_tasks: Vec<JoinHandle<()>>,
    exporter_tasks: Vec<JoinHandle<()>>,
    drain_tx: watch::Sender<Option<tokio::time::Instant>>,
}

impl Collector {
    /// Builds exporters, pipelines, and the router from configuration and
    /// spawns their worker tasks.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation (including
    /// capability-mismatched pipeline bindings) or an exporter cannot be
    /// constructed. Nothing is started in that case.
    pub fn start(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(CollectorStats::new());
        let (drain_tx, drain_rx) = watch::channel(None);

        let mut handles_by_name = HashMap::new();
        let mut exporter_tasks = Vec::new();
        for (name, exporter_config) in &config.exporters {
            let exporter = build_exporter(name, exporter_config)?;
            let exporter_stats = Arc::new(ExporterStats::new(name.clone()));
            let (handle, task) = spawn_exporter(
                exporter,
                ExporterOptions::from(exporter_config),
                exporter_stats,
                drain_rx.clone(),
            );
            handles_by_name.insert(name.clone(), handle);
            exporter_tasks.push(task);
        }

        let mut router =
            PipelineRouter::new(Duration::from_millis(config.limits.submit_timeout_ms));
        let mut pipeline_tasks = Vec::new();
        for (kind, spec) in config.pipeline_bindings() {
            let processor_configs: Vec<_> = spec
                .processors
                .iter()
                .filter_map(|name| config.processors.get(name).cloned())
                .collect();
            let chain = ProcessorChain::from_configs(&processor_configs);

            let exporters: Vec<ExporterHandle> = spec
                .exporters
                .iter()
                .filter_map(|name| handles_by_name.get(name).cloned())
                .collect();

            let (input, task) = spawn_pipeline(
                kind,
                chain,
                exporters.clone(),
                config.limits.pipeline_buffer,
                Arc::clone(&stats),
                drain_rx.clone(),
            );
            router.add_pipeline(kind, input, exporters);
            pipeline_tasks.push(task);

            tracing::info!(
                %kind,
                processors = spec.processors.len(),
                exporters = spec.exporters.len(),
                "pipeline configured"
            );
        }

        Ok(Self {
            router: Arc::new(router),
            stats,
            handles: handles_by_name.into_values().collect(),
            pipeline_tasks,
            exporter_tasks,
            drain_tx,
        })
    }

    /// The shared state handed to receivers and route handlers.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.router),
            Arc::clone(&self.stats),
            self.handles.clone(),
        )
    }

    /// The collector counters.
    #[must_use]
    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// Flushes pipelines and drains exporter queues.
    ///
    /// Pipeline workers push any queued inputs through their chains and
    /// flush partial batches downstream; exporter workers then attempt
    /// delivery until `drain` elapses. Batches undelivered at the
    /// deadline are counted as dropped. Never blocks past the deadline
    /// plus a small grace margin.
    pub async fn shutdown(self, drain: Duration) {
        let deadline = tokio::time::Instant::now() + drain;
        let _ = self.drain_tx.send(Some(deadline));

        // Drop our channel ends so workers can observe closure and exit
        // early once their queues are empty.
        drop(self.router);
        drop(self.handles);

        for task in self.pipeline_tasks {
            let _ = task.await;
        }

        let exporter_tasks = self.exporter_tasks;
        let join_all = async {
            for task in exporter_tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(drain + Duration::from_secs(1), join_all)
            .await
            .is_err()
        {
            tracing::warn!("exporter workers did not stop within the drain window");
        }

        tracing::info!("collector drained");
    }
}

/// Creates the HTTP application router: ingest endpoints (body-size
/// limited) plus the health and stats surface.
///
/// Public to allow testing the routes without starting a server.
#[must_use]
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(routes::ingest_routes(state.clone()).layer(RequestBodyLimitLayer::new(max_body_bytes)))
        .merge(routes::health_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Runs the Flowgate collector.
///
/// Loads process configuration from the environment and the pipeline
/// configuration from the configured TOML file, then serves until
/// SIGTERM/SIGINT.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or validated, or a
/// receiver fails to bind.
pub async fn run_collector() -> Result<()> {
    dotenvy::dotenv().ok();

    let process_config = Config::from_env()?;
    let collector_config = CollectorConfig::from_path(&process_config.config_path)
        .with_context(|| {
            format!(
                "loading collector config from {}",
                process_config.config_path
            )
        })?;

    run_with_config(process_config, collector_config).await
}

/// Runs the collector with the provided configuration.
///
/// This is useful for testing or when configuration is built
/// programmatically.
///
/// # Errors
///
/// Returns an error if the configuration fails validation or a receiver
/// fails to bind.
pub async fn run_with_config(process: Config, config: CollectorConfig) -> Result<()> {
    let collector = Collector::start(&config).context("starting pipelines")?;
    let state = collector.app_state();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_tasks: Vec<JoinHandle<()>> = Vec::new();

    // The HTTP server always carries the operational surface; ingest
    // routes are mounted only when the HTTP receiver is enabled.
    let http_port = config.receivers.http.as_ref().map_or(4318, |c| c.port);
    let app = if config.receivers.http.is_some() {
        create_router(state.clone(), config.limits.http_max_body_bytes)
    } else {
        Router::new()
            .merge(routes::health_routes(state.clone()))
            .layer(TraceLayer::new_for_http())
    };
    let http_addr: SocketAddr = format!("{}:{http_port}", process.host)
        .parse()
        .context("invalid HTTP listen address")?;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {http_addr}"))?;
    tracing::info!(
        addr = %http_addr,
        ingest = config.receivers.http.is_some(),
        "HTTP server listening"
    );
    let mut http_shutdown = shutdown_rx.clone();
    server_tasks.push(tokio::spawn(async move {
        let shutdown = async move {
            let _ = http_shutdown.changed().await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "HTTP server error");
        }
    }));

    if let Some(grpc_config) = &config.receivers.grpc {
        let grpc_addr: SocketAddr = format!("{}:{}", process.host, grpc_config.port)
            .parse()
            .context("invalid gRPC listen address")?;
        tracing::info!(addr = %grpc_addr, "gRPC server listening");

        let trace_service = TraceServiceServer::new(grpc::TraceServiceImpl::new(state.clone()));
        let logs_service = LogsServiceServer::new(grpc::LogsServiceImpl::new(state.clone()));
        let metrics_service =
            MetricsServiceServer::new(grpc::MetricsServiceImpl::new(state.clone()));

        let mut grpc_shutdown = shutdown_rx.clone();
        server_tasks.push(tokio::spawn(async move {
            let shutdown = async move {
                let _ = grpc_shutdown.changed().await;
            };
            let result = tonic::transport::Server::builder()
                .add_service(trace_service)
                .add_service(logs_service)
                .add_service(metrics_service)
                .serve_with_shutdown(grpc_addr, shutdown)
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "gRPC server error");
            }
        }));
    }

    if let Some(forward_config) = &config.receivers.forward {
        let forward_addr: SocketAddr = format!("{}:{}", process.host, forward_config.port)
            .parse()
            .context("invalid forward listen address")?;
        let listener = TcpListener::bind(forward_addr)
            .await
            .with_context(|| format!("binding forward listener on {forward_addr}"))?;
        tracing::info!(addr = %forward_addr, "forward listener listening");

        let options = forward::ForwardOptions::from(forward_config);
        server_tasks.push(tokio::spawn(forward::run_forward_listener(
            listener,
            state.clone(),
            options,
            shutdown_rx.clone(),
        )));
    }

    shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping receivers");

    let _ = shutdown_tx.send(true);
    for task in server_tasks {
        let _ = task.await;
    }
    drop(state);

    collector
        .shutdown(Duration::from_millis(config.limits.drain_ms))
        .await;
    tracing::info!("collector shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
