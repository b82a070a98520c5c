//! Flowgate wire protocol support.
//!
//! This module exposes the generated protobuf types for the Flowgate wire
//! protocol and the conversions from those types into the internal models.
//!
//! # Example
//!
//! ```ignore
//! use shared::wire::conversions::span_from_wire;
//! // Convert a wire span into the internal Span model
//! ```

pub mod conversions;

// Include the generated protobuf code
#[allow(clippy::all)]
#[allow(clippy::pedantic)]
#[allow(missing_docs)]
pub mod proto {
    //! Generated protobuf types for the Flowgate wire protocol.

    pub mod telemetry {
        //! Telemetry data types.
        pub mod v1 {
            #![allow(clippy::all)]
            #![allow(clippy::pedantic)]
            #![allow(missing_docs)]
            tonic::include_proto!("flowgate.telemetry.v1");

            // Include pbjson-generated serde implementations
            include!(concat!(env!("OUT_DIR"), "/flowgate.telemetry.v1.serde.rs"));
        }
    }

    pub mod collector {
        //! Collector export services.
        pub mod v1 {
            #![allow(clippy::all)]
            #![allow(clippy::pedantic)]
            #![allow(missing_docs)]
            tonic::include_proto!("flowgate.collector.v1");

            include!(concat!(env!("OUT_DIR"), "/flowgate.collector.v1.serde.rs"));
        }
    }
}
