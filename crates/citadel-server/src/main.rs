//! # citadel-server — server entry point
//!
//! Parses command-line arguments, loads the JSON configuration, assembles
//! the storage registry + artifact service, starts the checksum cache
//! sweeper, and serves the axum app until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use citadel_api::state::AppState;
use citadel_storage::ServerConfig;

/// Citadel artifact repository server.
///
/// Hosts Maven-style build artifacts over HTTP with per-artifact checksum
/// sidecars, per-directory version metadata, byte-range downloads, and
/// virtual group repositories.
#[derive(Parser, Debug)]
#[command(name = "citadel-server", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "citadel.json")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let port = cli.port.unwrap_or(config.port);

    let storage_count = config.storages.len();
    let repository_count: usize = config.storages.iter().map(|s| s.repositories.len()).sum();
    tracing::info!(storage_count, repository_count, "configuration loaded");

    let state = AppState::from_config(&config);
    state.service.cache().start();

    let app = citadel_api::app(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("citadel-server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.service.cache().stop();
    tracing::info!("citadel-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
}
