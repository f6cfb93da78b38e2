//! moodpost-acquire - Content Acquisition Microservice
//!
//! Builds quote + cover image + audio track bundles for a genre/language
//! pair and holds them until the caller publishes and releases them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use moodpost_common::config::{resolve_temp_root, TomlConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moodpost_acquire::{config, AppState, HeldBundleLimits};

/// Command-line arguments for moodpost-acquire
#[derive(Parser, Debug)]
#[command(name = "moodpost-acquire")]
#[command(about = "Content acquisition microservice for moodpost")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MOODPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MOODPOST_PORT")]
    port: Option<u16>,

    /// Directory for per-acquisition temp directories
    #[arg(short, long)]
    temp_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = args.port.unwrap_or(toml_config.port);
    let temp_root = resolve_temp_root(args.temp_root.as_deref(), config::ENV_TEMP_ROOT, &toml_config);

    info!("Starting moodpost-acquire (Content Acquisition) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Temp root: {}", temp_root.display());

    let assembler = config::build_assembler(&toml_config, &temp_root)
        .context("Failed to configure acquisition pipeline")?;

    let state = AppState::new(assembler).with_limits(HeldBundleLimits {
        ttl: Duration::from_secs(toml_config.acquisition.held_bundle_ttl_secs),
        max_bundles: toml_config.acquisition.max_held_bundles,
    });
    let sweeper = state.spawn_sweeper();
    let app = moodpost_acquire::build_router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    state.release_all().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
