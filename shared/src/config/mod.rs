//! Collector configuration.
//!
//! The collector is wired from a declarative TOML file enumerating the
//! enabled receivers, the named processors and exporters, and the pipeline
//! bindings per signal kind. The file is loaded once at startup and
//! validated before anything is constructed: invalid references, duplicate
//! ports, and capability-mismatched bindings all fail the process before it
//! accepts a single byte.
//!
//! # Example
//!
//! ```
//! use shared::config::CollectorConfig;
//!
//! let config = CollectorConfig::from_toml_str(r#"
//!     [receivers.http]
//!     port = 4318
//!
//!     [processors.batch]
//!     type = "batch"
//!
//!     [exporters.debug]
//!     type = "debug"
//!
//!     [pipelines.logs]
//!     processors = ["batch"]
//!     exporters = ["debug"]
//! "#).unwrap();
//!
//! assert!(config.receivers.http.is_some());
//! ```

use crate::models::SignalKind;
use crate::processors::{FilterMode, FilterRule};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating the collector configuration.
///
/// All of these are startup-time and fatal: the process must not start
/// with a configuration it cannot honor.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}")]
    Read {
        /// The path that was attempted.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// No receiver is enabled.
    #[error("no receivers are enabled")]
    NoReceivers,

    /// No pipeline is configured.
    #[error("no pipelines are configured")]
    NoPipelines,

    /// Two receivers are configured on the same port.
    #[error("receivers listen on duplicate port {0}")]
    DuplicatePort(u16),

    /// A `[pipelines.*]` key is not a known signal kind.
    #[error("unknown signal kind '{0}' in [pipelines] (expected traces, logs, or metrics)")]
    UnknownSignal(String),

    /// A pipeline references a processor that is not defined.
    #[error("pipeline '{pipeline}' references unknown processor '{name}'")]
    UnknownProcessor {
        /// The pipeline with the dangling reference.
        pipeline: String,
        /// The missing processor name.
        name: String,
    },

    /// A pipeline references an exporter that is not defined.
    #[error("pipeline '{pipeline}' references unknown exporter '{name}'")]
    UnknownExporter {
        /// The pipeline with the dangling reference.
        pipeline: String,
        /// The missing exporter name.
        name: String,
    },

    /// A pipeline binds an exporter that cannot accept its signal kind.
    #[error("exporter '{exporter}' cannot accept {kind} (bound in pipeline '{pipeline}')")]
    IncompatibleBinding {
        /// The exporter that was bound.
        exporter: String,
        /// The signal kind of the pipeline.
        kind: SignalKind,
        /// The pipeline carrying the binding.
        pipeline: String,
    },

    /// A pipeline has no exporters.
    #[error("pipeline '{0}' has no exporters")]
    EmptyPipeline(String),

    /// A push exporter is missing its endpoint.
    #[error("exporter '{0}' requires an endpoint")]
    MissingEndpoint(String),

    /// An exporter endpoint is not a valid URL.
    #[error("exporter '{exporter}' has an invalid endpoint")]
    InvalidEndpoint {
        /// The exporter with the bad endpoint.
        exporter: String,
        /// The underlying URL parse error.
        #[source]
        source: url::ParseError,
    },
}

/// Parses a `[pipelines.*]` key into a signal kind.
#[must_use]
pub fn signal_kind_from_name(name: &str) -> Option<SignalKind> {
    match name {
        "traces" => Some(SignalKind::Trace),
        "logs" => Some(SignalKind::Log),
        "metrics" => Some(SignalKind::Metric),
        _ => None,
    }
}

fn default_grpc_port() -> u16 {
    4317
}

fn default_http_port() -> u16 {
    4318
}

fn default_forward_port() -> u16 {
    2514
}

fn default_forward_max_batch_lines() -> usize {
    64
}

fn default_forward_flush_idle_ms() -> u64 {
    200
}

/// gRPC receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcReceiverConfig {
    /// Port the gRPC services listen on.
    #[serde(default = "default_grpc_port")]
    pub port: u16,
}

/// HTTP receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpReceiverConfig {
    /// Port the HTTP ingest routes listen on.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Row-forwarding receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardReceiverConfig {
    /// Port the forward listener accepts connections on.
    #[serde(default = "default_forward_port")]
    pub port: u16,

    /// Maximum rows grouped into one batch per connection.
    #[serde(default = "default_forward_max_batch_lines")]
    pub max_batch_lines: usize,

    /// Idle time after which a partial row group is submitted.
    #[serde(default = "default_forward_flush_idle_ms")]
    pub flush_idle_ms: u64,
}

/// The enabled protocol receivers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiversConfig {
    /// The gRPC receiver, if enabled.
    pub grpc: Option<GrpcReceiverConfig>,
    /// The HTTP receiver, if enabled.
    pub http: Option<HttpReceiverConfig>,
    /// The row-forwarding receiver, if enabled.
    pub forward: Option<ForwardReceiverConfig>,
}

fn default_batch_max_records() -> usize {
    8192
}

fn default_batch_max_age_ms() -> u64 {
    5000
}

/// Configuration of a single named processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessorConfig {
    /// Coalesce records up to a size or age threshold.
    Batch {
        /// Emit once this many records are buffered for one resource.
        #[serde(default = "default_batch_max_records")]
        max_records: usize,
        /// Emit buffered records after this many milliseconds regardless
        /// of count.
        #[serde(default = "default_batch_max_age_ms")]
        max_age_ms: u64,
    },

    /// Merge static attributes into batch resources, first-write-wins.
    Enrich {
        /// The attributes to merge.
        #[serde(default)]
        attributes: HashMap<String, String>,
    },

    /// Drop records by attribute equality rules.
    Filter {
        /// Whether matching records are dropped or kept.
        #[serde(default)]
        mode: FilterMode,
        /// The rules to apply.
        #[serde(default)]
        rules: Vec<FilterRule>,
    },
}

fn default_queue_capacity() -> usize {
    256
}

fn default_exporter_timeout_ms() -> u64 {
    10_000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

/// Retry policy for a single exporter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum delivery attempts per batch (including the first).
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_ms: default_retry_base_ms(),
            max_ms: default_retry_max_ms(),
        }
    }
}

/// The kind of a configured exporter, which determines the signal kinds it
/// can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExporterKind {
    /// Remote-write style metric push.
    MetricPush,
    /// Structured log stream push.
    LogPush,
    /// Span batch push.
    TracePush,
    /// Writes batch summaries to the process log. Accepts all signals.
    Debug,
}

impl ExporterKind {
    /// Returns true if this exporter kind can accept the given signal.
    #[must_use]
    pub fn supports(self, kind: SignalKind) -> bool {
        match self {
            Self::MetricPush => kind == SignalKind::Metric,
            Self::LogPush => kind == SignalKind::Log,
            Self::TracePush => kind == SignalKind::Trace,
            Self::Debug => true,
        }
    }

    /// Returns true if this exporter kind pushes over HTTP and therefore
    /// requires an endpoint.
    #[must_use]
    pub fn requires_endpoint(self) -> bool {
        !matches!(self, Self::Debug)
    }
}

/// Configuration of a single named exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// The exporter kind.
    #[serde(rename = "type")]
    pub kind: ExporterKind,

    /// The push endpoint URL. Required for all kinds except `debug`.
    pub endpoint: Option<String>,

    /// Capacity of the exporter's bounded queue, in batches.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_exporter_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_pipeline_buffer() -> usize {
    64
}

fn default_submit_timeout_ms() -> u64 {
    200
}

fn default_drain_ms() -> u64 {
    5000
}

fn default_http_max_body_bytes() -> usize {
    8 * 1024 * 1024
}

/// Collector-wide tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Capacity of each pipeline's inbound channel, in batches.
    #[serde(default = "default_pipeline_buffer")]
    pub pipeline_buffer: usize,

    /// How long a receiver waits to hand a batch to a pipeline before the
    /// submission is rejected as overloaded.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Drain window granted to exporters on shutdown.
    #[serde(default = "default_drain_ms")]
    pub drain_ms: u64,

    /// Maximum accepted HTTP request body size in bytes.
    #[serde(default = "default_http_max_body_bytes")]
    pub http_max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            pipeline_buffer: default_pipeline_buffer(),
            submit_timeout_ms: default_submit_timeout_ms(),
            drain_ms: default_drain_ms(),
            http_max_body_bytes: default_http_max_body_bytes(),
        }
    }
}

/// A pipeline binding: one signal kind, an ordered processor chain, and a
/// set of exporters. Immutable for the process lifetime once validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Processor names, in execution order.
    #[serde(default)]
    pub processors: Vec<String>,

    /// Exporter names receiving every processed batch.
    #[serde(default)]
    pub exporters: Vec<String>,
}

/// The full collector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// The enabled receivers.
    #[serde(default)]
    pub receivers: ReceiversConfig,

    /// Named processors available to pipelines.
    #[serde(default)]
    pub processors: HashMap<String, ProcessorConfig>,

    /// Named exporters available to pipelines.
    #[serde(default)]
    pub exporters: HashMap<String, ExporterConfig>,

    /// Pipeline bindings keyed by signal kind name (traces/logs/metrics).
    #[serde(default)]
    pub pipelines: HashMap<String, PipelineSpec>,

    /// Collector-wide tuning knobs.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl CollectorConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or
    /// if validation fails.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if parsing or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: no receivers or pipelines,
    /// duplicate ports, dangling references, capability-mismatched
    /// bindings, or invalid endpoints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receivers.grpc.is_none()
            && self.receivers.http.is_none()
            && self.receivers.forward.is_none()
        {
            return Err(ConfigError::NoReceivers);
        }

        let mut ports = HashSet::new();
        let configured_ports = [
            self.receivers.grpc.as_ref().map(|r| r.port),
            self.receivers.http.as_ref().map(|r| r.port),
            self.receivers.forward.as_ref().map(|r| r.port),
        ];
        for port in configured_ports.into_iter().flatten() {
            if !ports.insert(port) {
                return Err(ConfigError::DuplicatePort(port));
            }
        }

        if self.pipelines.is_empty() {
            return Err(ConfigError::NoPipelines);
        }

        for (name, spec) in &self.pipelines {
            let kind = signal_kind_from_name(name)
                .ok_or_else(|| ConfigError::UnknownSignal(name.clone()))?;

            if spec.exporters.is_empty() {
                return Err(ConfigError::EmptyPipeline(name.clone()));
            }

            for processor in &spec.processors {
                if !self.processors.contains_key(processor) {
                    return Err(ConfigError::UnknownProcessor {
                        pipeline: name.clone(),
                        name: processor.clone(),
                    });
                }
            }

            for exporter in &spec.exporters {
                let Some(config) = self.exporters.get(exporter) else {
                    return Err(ConfigError::UnknownExporter {
                        pipeline: name.clone(),
                        name: exporter.clone(),
                    });
                };
                if !config.kind.supports(kind) {
                    return Err(ConfigError::IncompatibleBinding {
                        exporter: exporter.clone(),
                        kind,
                        pipeline: name.clone(),
                    });
                }
            }
        }

        for (name, exporter) in &self.exporters {
            if exporter.kind.requires_endpoint() {
                let endpoint = exporter
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingEndpoint(name.clone()))?;
                Url::parse(endpoint).map_err(|source| ConfigError::InvalidEndpoint {
                    exporter: name.clone(),
                    source,
                })?;
            }
        }

        Ok(())
    }

    /// Resolves pipeline bindings into signal kinds.
    ///
    /// Only meaningful after [`Self::validate`] has passed.
    #[must_use]
    pub fn pipeline_bindings(&self) -> Vec<(SignalKind, &PipelineSpec)> {
        self.pipelines
            .iter()
            .filter_map(|(name, spec)| signal_kind_from_name(name).map(|kind| (kind, spec)))
            .collect()
    }
}
