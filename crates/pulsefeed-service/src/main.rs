//! pulsefeed - windowed telemetry collector.
//!
//! Run with: `cargo run -p pulsefeed-service -- --session-name 1330`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use time::UtcOffset;
use tracing::info;

use pulsefeed_service::{Config, CycleScheduler, ExitStatus, ShutdownCoordinator, log_filter};
use pulsefeed_store::DataPaths;

/// pulsefeed - poll wearable telemetry into a local history.
#[derive(Parser, Debug)]
#[command(name = "pulsefeed")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session name; requests are scoped to `{session}_{address}`.
    #[arg(short, long)]
    session_name: Option<String>,

    /// Device registry file (overrides config).
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Data directory (overrides config).
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Replay windows from this instant, `YYYY-MM-DD-HH-MM-SS`.
    #[arg(long)]
    fixed_start: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), args.verbose);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // No usable config: back up whatever sits in the data directory we know of.
            let paths = args
                .data_dir
                .as_deref()
                .map(DataPaths::in_dir)
                .unwrap_or_default();
            let coordinator = ShutdownCoordinator::for_paths(&paths, UtcOffset::UTC);
            return coordinator.backup_on_failure(&format!("{:#}", e)).into();
        }
    };

    let offset = config.api.offset().unwrap_or(UtcOffset::UTC);
    let coordinator = ShutdownCoordinator::for_paths(&config.storage.paths(), offset);

    // Listen before loading the registry and history so a signal during
    // startup still ends in a backup.
    let _listener = coordinator.listen();

    let mut scheduler = match CycleScheduler::from_config(&config) {
        Ok(scheduler) => scheduler,
        Err(e) => return coordinator.backup_on_failure(&e).into(),
    };

    if let Some(session) = &config.api.session {
        info!("Session: {}", session);
    }
    info!(
        "Polling {} device(s) every {}s",
        scheduler.devices().len(),
        config.window.interval_secs
    );

    let status = match scheduler.run(&coordinator.token()).await {
        Ok(_) => ExitStatus::Interrupted,
        Err(e) => {
            tracing::error!("Collector stopped: {}", e);
            ExitStatus::Failed
        }
    };

    coordinator.complete(&mut scheduler, status).await.into()
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(session) = &args.session_name {
        config.api.session = Some(session.trim().to_string());
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(registry) = &args.registry {
        config.storage.registry = Some(registry.clone());
    }
    if let Some(start) = &args.fixed_start {
        config.window.fixed_start = Some(start.clone());
    }

    config.validate()?;
    Ok(config)
}
