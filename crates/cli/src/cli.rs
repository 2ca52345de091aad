//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Activity Recognizer - accelerometer activity recognition pipeline
#[derive(Parser, Debug)]
#[command(
    name = "activity-recognizer",
    author,
    version,
    about = "Accelerometer activity recognition pipeline",
    long_about = "Classifies tri-axial accelerometer streams into activities.\n\n\
                  Reads samples from a recorded JSON-lines file or from synthetic \n\
                  generators, windows them per stream, extracts features, runs the \n\
                  configured model and dispatches results to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ACTIVITY_RECOGNIZER_VERBOSE")]
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
        env = "ACTIVITY_RECOGNIZER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level used when `RUST_LOG` is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the recognition pipeline
    Run(RunArgs),

    /// Validate configuration and model without running
    Validate(ValidateArgs),

    /// Display configuration and model information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config/recognizer.toml",
        env = "ACTIVITY_RECOGNIZER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the model artifact path from configuration
    #[arg(long, env = "ACTIVITY_RECOGNIZER_MODEL")]
    pub model: Option<PathBuf>,

    /// Replay samples from a JSON-lines file
    #[arg(short, long, conflicts_with = "synthetic")]
    pub input: Option<PathBuf>,

    /// Replay speed multiplier (unset = as fast as possible)
    #[arg(long, requires = "input")]
    pub replay_speed: Option<f64>,

    /// Generate synthetic streams for these profiles (comma separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_profile)]
    pub synthetic: Vec<ingestion::ActivityProfile>,

    /// Synthetic streams per profile
    #[arg(long, default_value = "1")]
    pub streams_per_profile: usize,

    /// Synthetic stream length in seconds of signal time
    #[arg(long, default_value = "30")]
    pub duration: u64,

    /// Real-time multiplier for synthetic streams (unset = as fast as possible)
    #[arg(long)]
    pub pace: Option<f64>,

    /// Seed for synthetic noise
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Stop after this many results (0 = unlimited)
    #[arg(long, default_value = "0", env = "ACTIVITY_RECOGNIZER_MAX_RESULTS")]
    pub max_results: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "ACTIVITY_RECOGNIZER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size for internal queues
    #[arg(long, default_value = "1024", env = "ACTIVITY_RECOGNIZER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ACTIVITY_RECOGNIZER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print per-stream activity segments and patterns at the end
    #[arg(long)]
    pub activity_summary: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config/recognizer.toml")]
    pub config: PathBuf,

    /// Override the model artifact path from configuration
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/recognizer.toml")]
    pub config: PathBuf,

    /// Override the model artifact path from configuration
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every feature name of the schema
    #[arg(long)]
    pub features: bool,

    /// Show sink configuration
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
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

fn parse_profile(name: &str) -> Result<ingestion::ActivityProfile, String> {
    ingestion::ActivityProfile::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ingestion::ActivityProfile::ALL
            .iter()
            .map(|p| p.name())
            .collect();
        format!("unknown profile '{}', expected one of: {}", name, known.join(", "))
    })
}
