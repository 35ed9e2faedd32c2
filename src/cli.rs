//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::{GroupKey, ObservedPolicy};
use crate::report::ChartKind;
use clap::Parser;
use std::path::PathBuf;

/// Swarmscope - trust and mission analytics for robot-swarm simulations
///
/// Turns stored simulation runs into chart-data documents: mission
/// success and malicious-robot detection per group, finish time with
/// and without trust, and trust decomposition of a single robot.
///
/// Examples:
///   swarmscope --records runs/ --chart success --chart detection
///   swarmscope --records runs.json --chart trust --robot 3 --observed malicious
///   swarmscope --records runs/ --chart trust --robot 3 --observed peer --peer 7 --format markdown
///   swarmscope --records runs/ --list
///   swarmscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file or directory of stored simulation runs
    ///
    /// Can also be set via SWARMSCOPE_RECORDS or .swarmscope.toml.
    #[arg(long, value_name = "PATH", env = "SWARMSCOPE_RECORDS")]
    pub records: Option<PathBuf>,

    /// Charts to build (repeatable)
    #[arg(long = "chart", value_name = "KIND")]
    pub charts: Vec<ChartKind>,

    /// Focal robot of the trust chart
    #[arg(long, value_name = "ROBOT")]
    pub robot: Option<String>,

    /// Peers the trust chart is restricted to
    #[arg(long, default_value = "all", value_name = "POLICY")]
    pub observed: ObservedArg,

    /// Peer robot for --observed peer
    #[arg(long, value_name = "ROBOT")]
    pub peer: Option<String>,

    /// Bucket width of time-series charts in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Key used to group runs for success and detection charts
    #[arg(long, value_name = "KEY")]
    pub group_key: Option<GroupKey>,

    /// Only include these record ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Only include runs whose group key is one of these (comma-separated)
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Output file path for the chart bundle
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Per-chart build timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .swarmscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// List stored runs and exit
    #[arg(long)]
    pub list: bool,

    /// Delete the stored run with this id and exit
    #[arg(long, value_name = "ID")]
    pub delete: Option<String>,

    /// Exit with code 2 when every requested chart is empty
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Generate a default .swarmscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the chart bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
}

/// Observed-peer policy as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ObservedArg {
    /// Every peer the robot logged
    All,
    /// Peers flagged malicious
    Malicious,
    /// Peers not flagged malicious
    NonMalicious,
    /// The peer given with --peer
    Peer,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.interval_ms == Some(0) {
            return Err("Interval must be at least 1 ms".to_string());
        }

        if self.charts.contains(&ChartKind::Trust) && self.robot.is_none() {
            return Err("The trust chart requires --robot".to_string());
        }

        if self.observed == ObservedArg::Peer && self.peer.is_none() {
            return Err("--observed peer requires --peer".to_string());
        }

        if self.peer.is_some() && self.observed != ObservedArg::Peer {
            return Err("--peer is only used with --observed peer".to_string());
        }

        if self.list && self.delete.is_some() {
            return Err("Cannot use both --list and --delete".to_string());
        }

        Ok(())
    }

    /// Charts to build, defaulting to every grouped chart.
    pub fn effective_charts(&self) -> Vec<ChartKind> {
        if self.charts.is_empty() {
            return vec![ChartKind::Success, ChartKind::Detection, ChartKind::FinishTime];
        }
        let mut charts = Vec::new();
        for chart in &self.charts {
            if !charts.contains(chart) {
                charts.push(*chart);
            }
        }
        charts
    }

    /// The observed-peer policy of the trust chart.
    pub fn observed_policy(&self) -> ObservedPolicy {
        match self.observed {
            ObservedArg::All => ObservedPolicy::Unfiltered,
            ObservedArg::Malicious => ObservedPolicy::MaliciousOnly,
            ObservedArg::NonMalicious => ObservedPolicy::NonMaliciousOnly,
            ObservedArg::Peer => {
                ObservedPolicy::SpecificPeer(self.peer.clone().unwrap_or_default())
            }
        }
    }
}
