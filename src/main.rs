use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use syncthing_tray_monitor::config::{Config, ConfigOverrides};
use syncthing_tray_monitor::monitor::Monitor;
use syncthing_tray_monitor::surface::LogSurface;
use syncthing_tray_monitor::syncthing_client::SyncthingClient;
use syncthing_tray_monitor::types::MonitorError;

/// Tray status monitor for a Syncthing daemon.
#[derive(Debug, Parser)]
#[command(name = "syncthing-tray", version, about)]
struct Cli {
    /// Daemon base URL, e.g. http://localhost:8384
    #[arg(long = "target", value_name = "URL")]
    target: Option<String>,

    /// API key (read from the Syncthing config.xml when omitted)
    #[arg(long = "api", value_name = "KEY")]
    api: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(short = 'i', long)]
    insecure: bool,

    /// Show activity from measured transfer rates instead of completion
    #[arg(short = 'R', long = "use-rates")]
    use_rates: bool,

    /// Path to config.json
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.target.clone(),
            api_key: self.api.clone(),
            insecure: self.insecure,
            use_rates: self.use_rates,
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    let cli = Cli::parse();
    setup_logging();

    let config = Config::load(cli.config.as_deref())
        .await
        .with_overrides(cli.overrides());
    info!(url = %config.url, "syncthing-tray starting");

    let client = match SyncthingClient::discover(&config).await {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "Cannot talk to Syncthing");
            return Err(err);
        }
    };

    let handle = Monitor::new(Arc::new(client), Arc::new(LogSurface), &config).spawn();

    wait_for_shutdown().await?;
    info!(phase = ?handle.phase(), "Shutting down");
    // Worker tasks may be parked in a long poll; do not wait for them.
    std::process::exit(0);
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<(), MonitorError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<(), MonitorError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
