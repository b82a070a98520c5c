//! Pipeline routing and per-signal workers.
//!
//! At startup the validated configuration is turned into one pipeline per
//! signal kind: an input channel, a processor chain instance, and the
//! handles of the bound exporters. The router dispatches every decoded
//! batch to the pipeline matching its kind and applies admission control;
//! the worker runs the chain and fans processed batches out to every
//! exporter queue.

mod router;
mod worker;

pub use router::{AdmissionError, PipelineRouter};
pub use worker::spawn_pipeline;
