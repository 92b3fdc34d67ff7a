//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// diffz - differential phase sensing with paired RFID tags
#[derive(Parser, Debug)]
#[command(
    name = "diffz",
    author,
    version,
    about = "Differential phase pipeline for paired RFID tags",
    long_about = "Streams tag reads from a recording or a synthetic reader, estimates the \n\
                  phase difference of a tag pair over sliding windows, and dispatches \n\
                  the resulting metric batches to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DIFFZ_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DIFFZ_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the live pipeline from the configured source to the sinks
    Run(RunArgs),

    /// Offline windowed sweep over a recorded file
    Sweep(SweepArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Show version, supported modes and sensor profiles
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "diffz.toml", env = "DIFFZ_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many seconds (0 = run until the source ends or Ctrl+C)
    #[arg(long, default_value = "0", env = "DIFFZ_DURATION")]
    pub duration: u64,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "DIFFZ_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Replay this recording instead of the configured source
    #[arg(long, env = "DIFFZ_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (0 = as fast as possible)
    #[arg(long)]
    pub replay_speed: Option<f64>,

    /// Restart the recording when it ends
    #[arg(long)]
    pub replay_loop: bool,

    /// Stop the synthetic source after this many events
    #[arg(long, env = "DIFFZ_MAX_EVENTS")]
    pub max_events: Option<u64>,
}

/// Arguments for the `sweep` command
#[derive(Parser, Debug, Clone)]
pub struct SweepArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "diffz.toml", env = "DIFFZ_CONFIG")]
    pub config: PathBuf,

    /// Recording to sweep (defaults to `source.path` from the configuration)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write the samples as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the samples as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Known true difference; adds RMSE and R^2 to the summary
    #[arg(long, value_name = "DEG", allow_hyphen_values = true)]
    pub expected: Option<f64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "diffz.toml", env = "DIFFZ_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Also describe this configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["diffz", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("diffz.toml"));
        assert_eq!(args.duration, 0);
        assert_eq!(args.metrics_port, 0);
        assert!(args.max_events.is_none());
    }

    #[test]
    fn test_sweep_flags() {
        let cli = Cli::try_parse_from([
            "diffz", "-v", "sweep", "-c", "exp.toml", "-i", "reads.csv", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.input, Some(PathBuf::from("reads.csv")));
        assert!(args.json);
        assert!(args.output.is_none());
        assert!(args.expected.is_none());

        let cli = Cli::try_parse_from(["diffz", "sweep", "--expected", "20"]).unwrap();
        let Commands::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.expected, Some(20.0));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["diffz", "-q", "-v", "info"]).is_err());
    }
}
