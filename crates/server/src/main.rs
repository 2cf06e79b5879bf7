//! Ember server binary.

use anyhow::{Context, Result};
use clap::Parser;
use ember_core::config::AppConfig;
use ember_server::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ember - an ephemeral, self-expiring post board
#[derive(Parser, Debug)]
#[command(name = "emberd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "EMBER_CONFIG", default_value = "ember.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Ember v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration. The file is optional: every field has a default
    // and env vars can provide or override everything.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}, using defaults", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("EMBER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    ember_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize the post store
    let store = ember_store::from_config(&config.store)
        .await
        .context("failed to initialize post store")?;
    tracing::info!(backend = store.backend_name(), "Post store initialized");

    // Verify store connectivity before accepting requests.
    // This catches configuration errors and connectivity issues early,
    // preventing the server from reporting healthy when the store is unreachable.
    store
        .health_check()
        .await
        .context("post store health check failed")?;
    tracing::info!("Post store connectivity verified");

    // No tagger implementation ships with the server; wire one in here.
    tracing::info!("No tagger configured, posts keep empty tags");

    // Create application state
    let state = AppState::new(config.clone(), store.clone(), None);

    // Spawn the expiry sweeper if enabled
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = state
        .sweep_interval()
        .map(|interval| ember_server::sweep::spawn_sweeper(store, interval, shutdown_rx));
    if sweeper.is_none() {
        tracing::warn!("Expiry sweeper disabled, stale index entries will accumulate");
    }

    // Create router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweeper and wait for any in-flight sweep to finish
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
