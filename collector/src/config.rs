//! Process configuration module.
//!
//! Handles loading process-level configuration from environment variables
//! with sensible defaults. The pipeline wiring itself comes from the
//! declarative collector config file (see [`shared::config`]).

use anyhow::Result;

/// Process configuration.
///
/// Configuration values can be set via environment variables:
/// - `FLOWGATE_HOST`: The host address receivers bind to (default: "0.0.0.0")
/// - `FLOWGATE_CONFIG`: Path to the collector config file (default: "flowgate.toml")
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address receivers bind to.
    pub host: String,
    /// Path to the collector configuration file.
    pub config_path: String,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible so future variables can be
    /// validated without changing callers.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("FLOWGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let config_path =
            std::env::var("FLOWGATE_CONFIG").unwrap_or_else(|_| "flowgate.toml".to_string());

        Ok(Self { host, config_path })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            config_path: "flowgate.toml".to_string(),
        }
    }
}
