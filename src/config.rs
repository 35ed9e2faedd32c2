//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.swarmscope.toml` files.

use crate::analysis::GroupKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".swarmscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Per-chart build timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "swarmscope_charts.json".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Bucket width of time-series charts in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Key used to group runs for success and detection charts.
    #[serde(default)]
    pub group_key: GroupKey,

    /// Dataset colors, assigned in order.
    #[serde(default)]
    pub palette: Vec<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            group_key: GroupKey::default(),
            palette: Vec::new(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file or directory holding stored runs.
    #[serde(default = "default_records")]
    pub records: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            records: default_records(),
        }
    }
}

fn default_records() -> String {
    "records".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values the user passed explicitly override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref records) = args.records {
            self.store.records = records.display().to_string();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(interval) = args.interval_ms {
            self.chart.interval_ms = interval;
        }
        if let Some(key) = args.group_key {
            self.chart.group_key = key;
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level from the merged verbosity settings. `quiet` wins.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Check values the type system does not rule out.
    pub fn validate(&self) -> Result<()> {
        if self.chart.interval_ms == 0 {
            anyhow::bail!("chart.interval_ms must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
