//! gRPC receiver services.
//!
//! Implements the Flowgate export services for ingesting traces, logs, and
//! metrics over the binary RPC transport.
//!
//! # Services
//!
//! - `TraceService` - Receives trace spans
//! - `LogsService` - Receives log records
//! - `MetricsService` - Receives metric points

mod services;

pub use services::{LogsServiceImpl, MetricsServiceImpl, TraceServiceImpl};
