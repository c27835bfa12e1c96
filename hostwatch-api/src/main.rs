mod server;

use anyhow::{Context, Result};
use clap::Parser;
use hostwatch_core::{
    HostRemediator, HostSampler, IncidentLog, ScratchDir, SystemdProbe, WatchdogConfig,
};
use server::ApiState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Read-only status API for the hostwatch watchdog, plus a manual restart
/// trigger. Runs independently of the daemon against the same host and the
/// same incident log.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the watchdog configuration file
    #[arg(short, long, default_value = "watchdog.yaml", env = "HOSTWATCH_CONFIG")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000, env = "HOSTWATCH_API_PORT")]
    port: u16,
}

fn init_tracing() {
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
    let scratch = ScratchDir::new(&config.scratch_dir)
        .context("validating the disk-cleanup scratch directory")?;
    let command_timeout = Duration::from_secs(config.command_timeout);

    let state = ApiState {
        sampler: Arc::new(HostSampler::new(config.mount_point.clone())),
        probe: Arc::new(SystemdProbe::new(command_timeout)),
        remediator: Arc::new(HostRemediator::new(scratch, command_timeout)),
        incidents: IncidentLog::new(config.incident_log_path()),
        config,
    };

    server::serve(state, cli.port).await
}
