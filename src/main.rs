//! derived-tlm - Command-line entry point
//!
//! Evaluates one virtual channel against a JSON archive snapshot and prints
//! the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! derived-tlm pitch_comp --start 2019:123 --stop 2019:124 --archive snapshot.json
//! derived-tlm pm2thv1t_clean --start 2019:123 --stop 2019:130 \
//!     --interval daily --units sci --archive snapshot.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use derived_tlm::{
    backend::ArchiveSnapshot,
    config::{EngineConfig, LoggingSettings},
    handlers::register_defaults,
    registry::{Dispatcher, Registry},
    time::parse_time,
    StatInterval, UnitSystem,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "derived-tlm")]
#[command(about = "Compute derived telemetry channels on demand", long_about = None)]
struct Cli {
    /// Virtual channel name (e.g. quat_aoattqt, cmd_state_pitch_1000)
    channel: String,

    /// Range start (YYYY:DOY[:HH:MM:SS], ISO date or CXC seconds)
    #[arg(long)]
    start: String,

    /// Range stop, exclusive
    #[arg(long)]
    stop: String,

    /// Statistics roll-up interval (5min or daily)
    #[arg(long)]
    interval: Option<String>,

    /// Output unit system (cxc, sci or eng)
    #[arg(long)]
    units: Option<String>,

    /// JSON archive snapshot with telemetry, model tables and states
    #[arg(long)]
    archive: PathBuf,

    /// Engine configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

/// Install the stderr logger, plus a daily-rolled file when a log directory
/// is configured. The returned guard flushes the file writer on drop.
fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter.as_str()));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &settings.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "derived-tlm.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(Some(path.as_path()))
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::load_or_default(None),
    };
    let _log_guard = init_logging(&config.logging);

    let tstart = parse_time(&cli.start)?;
    let tstop = parse_time(&cli.stop)?;
    let interval = cli
        .interval
        .as_deref()
        .map(str::parse::<StatInterval>)
        .transpose()?;
    let unit_system = cli
        .units
        .as_deref()
        .map(str::parse::<UnitSystem>)
        .transpose()?;

    tracing::info!("Loading archive snapshot {}", cli.archive.display());
    let (archive, model, states) = ArchiveSnapshot::load_json(&cli.archive)
        .with_context(|| format!("loading archive {}", cli.archive.display()))?
        .into_collaborators();

    let mut registry = Registry::new();
    register_defaults(&mut registry, &config)?;

    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(archive), config)
        .with_model(Arc::new(model))
        .with_states(Arc::new(states));

    tracing::info!("Computing {} from {} to {}", cli.channel, cli.start, cli.stop);
    let result = dispatcher.dispatch(&cli.channel, tstart, tstop, interval, unit_system)?;
    tracing::info!(
        "{}: {} samples, {} bad",
        result.name,
        result.len(),
        result.bads.iter().filter(|&&b| b).count()
    );

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);
    Ok(())
}
