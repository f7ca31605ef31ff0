use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tunnelwatch::{TunnelWatchConfig, telemetry, web};

/// Crowdsourced traffic status for the two entrances of a road tunnel
#[derive(Debug, Parser)]
#[command(name = "tunnelwatch", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TunnelWatchConfig::load_from_path(cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    let _telemetry = telemetry::init(&config.logging)?;

    tracing::info!(
        version = tunnelwatch::VERSION,
        store = %config.store.backend,
        radius_m = config.geofence.radius_meters,
        window_h = config.scoring.window_hours,
        half_life_min = config.scoring.half_life_minutes,
        "Starting tunnelwatch"
    );

    let state = web::build_state(&config).await?;
    web::run(state, &config.server).await
}
