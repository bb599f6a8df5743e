//! Framewatch Control - CLI over the analytical engine
//!
//! Reads a JSON array of telemetry samples, runs one engine operation and
//! prints the result as pretty JSON on stdout. Logs go to stderr.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "framewatchctl")]
#[command(about = "Framewatch - device performance telemetry analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where samples come from and which route to keep
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// JSON samples file, `-` for stdin
    #[arg(long, short, default_value = "-")]
    pub input: PathBuf,

    /// Only use samples from this screen/route
    #[arg(long)]
    pub route: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Descriptive statistics for one metric
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// fps, memory_usage, cpu_usage or load_time
        #[arg(long, default_value = "fps")]
        metric: String,
    },

    /// Regression trend for one metric
    Trend {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, default_value = "fps")]
        metric: String,

        /// Label echoed back in the result
        #[arg(long, default_value = "all samples")]
        period: String,

        /// Also run a Mann-Kendall test
        #[arg(long)]
        mann_kendall: bool,
    },

    /// Z-score anomalies; all metrics unless one is given
    Anomalies {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        metric: Option<String>,

        /// Overrides the configured anomaly threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Calendar patterns, or an additive decomposition with --period
    Seasonal {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, default_value = "fps")]
        metric: String,

        /// Comma-separated grains: hourly,daily,weekly,monthly
        #[arg(long, default_value = "hourly,daily,weekly,monthly")]
        patterns: String,

        /// Decompose with this cycle length instead of scanning grains
        #[arg(long)]
        period: Option<usize>,
    },

    /// Composite performance score
    Score {
        #[command(flatten)]
        input: InputArgs,

        /// JSON PerformanceSummary to compare against
        #[arg(long)]
        baseline: Option<PathBuf>,
    },

    /// Device tier classification
    Tier {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Score forecast for a route
    Predict {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Days ahead; configured default when omitted
        #[arg(long)]
        horizon: Option<u32>,

        /// Comma-separated models: linear_regression,exponential_smoothing,seasonal_decomposition
        #[arg(long)]
        models: Option<String>,
    },

    /// Full insights for one route, or every route
    Report {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        baseline: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("FRAMEWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stats { input, metric } => commands::stats(&input, &metric),
        Commands::Trend {
            input,
            metric,
            period,
            mann_kendall,
        } => commands::trend(&input, &metric, &period, mann_kendall),
        Commands::Anomalies {
            input,
            metric,
            threshold,
        } => commands::anomalies(&config, &input, metric.as_deref(), threshold),
        Commands::Seasonal {
            input,
            metric,
            patterns,
            period,
        } => commands::seasonal(&input, &metric, &patterns, period),
        Commands::Score { input, baseline } => {
            commands::score(config, &input, baseline.as_deref())
        }
        Commands::Tier { input } => commands::tier(config, &input),
        Commands::Predict {
            input,
            baseline,
            horizon,
            models,
        } => commands::predict(config, &input, baseline.as_deref(), horizon, models.as_deref()),
        Commands::Report { input, baseline } => {
            commands::report(config, &input, baseline.as_deref())
        }
        Commands::Config => commands::print_config(&config),
    }
}
