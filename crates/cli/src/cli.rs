//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// PV Monitor - live power-flow client for the PV simulation backend
#[derive(Parser, Debug)]
#[command(
    name = "pv-monitor",
    author,
    version,
    about = "Live power-flow monitor for the PV simulation backend",
    long_about = "Polls a PV simulation backend while it runs and keeps a bounded window of \n\
                  meter / PV / net readings on screen.\n\n\
                  Type `start`, `stop`, `status` or `quit` on stdin during `run`."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PV_MONITOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PV_MONITOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a live monitoring session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "PV_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override backend base URL from configuration
    #[arg(long, env = "PV_MONITOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Override polling period (milliseconds)
    #[arg(long, env = "PV_MONITOR_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Ask the backend to start the simulation once the session is up
    #[arg(long)]
    pub start: bool,

    /// Stop after this many display frames (0 = unlimited)
    #[arg(long, default_value = "0", env = "PV_MONITOR_MAX_FRAMES")]
    pub max_frames: u64,

    /// Session timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "PV_MONITOR_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PV_MONITOR_METRICS_PORT")]
    pub metrics_port: u16,

    /// Use the in-process simulated backend instead of HTTP
    #[arg(long)]
    pub mock: bool,

    /// Seed for the simulated meter (mock mode only, default 42)
    #[arg(long, requires = "mock")]
    pub seed: Option<u64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
