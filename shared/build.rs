//! Build script for compiling the Flowgate wire protocol definitions.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tell cargo to rerun this build script if proto files change
    println!("cargo:rerun-if-changed=proto/");

    let proto_files = &[
        "proto/flowgate/telemetry/v1/telemetry.proto",
        "proto/flowgate/collector/v1/collector.proto",
    ];

    let proto_include_dirs = &["proto"];

    // Get output directory
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    // Create a file descriptor set for pbjson
    let descriptor_path = out_dir.join("proto_descriptor.bin");

    // Compile the wire protocol definitions with file descriptor output
    tonic_prost_build::configure()
        .build_server(true) // Enable gRPC server generation
        .emit_rerun_if_changed(false) // Don't rebuild unless proto files change
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(proto_files, proto_include_dirs)?;

    // Generate serde implementations using pbjson
    let descriptor_set = std::fs::read(&descriptor_path)?;
    pbjson_build::Builder::new()
        .register_descriptors(&descriptor_set)?
        .build(&[".flowgate"])?;

    Ok(())
}
