use anyhow::{Context, Result};
use clap::Parser;
use hostwatch_core::{
    HostRemediator, HostSampler, IncidentLog, MetricsStore, MonitorLoop, ScratchDir, SystemdProbe,
    WatchdogConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Host watchdog daemon: samples the host, checks services, remediates,
/// and appends to the incident log and metrics CSV until terminated.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the watchdog configuration file
    #[arg(short, long, default_value = "watchdog.yaml", env = "HOSTWATCH_CONFIG")]
    config: PathBuf,
}

fn init_tracing() {
    // RUST_LOG wins when set; default to info otherwise.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Arc::new(
        WatchdogConfig::load(&cli.config)
            .with_context(|| format!("loading configuration from {}", cli.config.display()))?,
    );

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;

    let scratch = ScratchDir::new(&config.scratch_dir)
        .context("validating the disk-cleanup scratch directory")?;
    let command_timeout = Duration::from_secs(config.command_timeout);

    info!(
        config = %cli.config.display(),
        services = config.services.len(),
        scratch = %scratch.path().display(),
        "hostwatch daemon starting"
    );

    let monitor = MonitorLoop::new(
        config.clone(),
        Arc::new(HostSampler::new(config.mount_point.clone())),
        Arc::new(SystemdProbe::new(command_timeout)),
        Arc::new(HostRemediator::new(scratch, command_timeout)),
        IncidentLog::new(config.incident_log_path()),
        MetricsStore::new(config.metrics_csv_path()),
    );

    monitor
        .run()
        .await
        .context("monitor loop stopped: persistent storage is unwritable")?;
    Ok(())
}
