//! Flowgate Shared Library
//!
//! This crate contains the types and logic shared across the Flowgate
//! telemetry collector.
//!
//! # Modules
//!
//! - [`models`] - Data models for spans, log entries, and metric points
//! - [`wire`] - The wire protocol (protobuf) and conversions into the models
//! - [`processors`] - Batch transformations applied by pipelines
//! - [`config`] - Declarative collector configuration with load-time validation
//!
//! # Example
//!
//! ```
//! use shared::models::{LogBody, LogEntry, LogLevel};
//!
//! let log = LogEntry::new(LogLevel::Info, LogBody::text("User logged in"))
//!     .with_attribute("user_id", "12345")
//!     .with_trace_id("0af7651916cd43dd8448eb211c80319c");
//!
//! assert!(log.validate_entry().is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod models;
pub mod processors;
pub mod wire;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
