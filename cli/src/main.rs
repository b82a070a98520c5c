//! Flowgate CLI
//!
//! Command-line interface for operating the Flowgate collector.
//!
//! # Usage
//!
//! ```bash
//! flowgate --help
//! flowgate check-config flowgate.toml
//! flowgate health
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::config::CollectorConfig;

/// Flowgate CLI - telemetry collector command-line interface
#[derive(Parser)]
#[command(name = "flowgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Collector URL (the HTTP receiver port)
    #[arg(
        short,
        long,
        env = "FLOWGATE_URL",
        default_value = "http://localhost:4318"
    )]
    url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a collector configuration file
    CheckConfig {
        /// Path to the configuration file
        #[arg(default_value = "flowgate.toml")]
        path: String,
    },
    /// Query a running collector's readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig { path }) => check_config(&path),
        Some(Commands::Health) => health(&cli.url).await,
        None => {
            println!("Flowgate CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

/// Loads and validates a config file, printing a summary of the wiring.
fn check_config(path: &str) -> Result<()> {
    let config = CollectorConfig::from_path(path)?;

    println!("{path}: OK");
    for (kind, spec) in config.pipeline_bindings() {
        println!(
            "  {kind}: {} -> {}",
            if spec.processors.is_empty() {
                "(no processors)".to_string()
            } else {
                spec.processors.join(" -> ")
            },
            spec.exporters.join(", ")
        );
    }
    Ok(())
}

/// Fetches readiness from a running collector and prints it.
async fn health(url: &str) -> Result<()> {
    let endpoint = format!("{}/health/ready", url.trim_end_matches('/'));
    let response = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("requesting {endpoint}"))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("parsing readiness response")?;

    println!("{status}");
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
