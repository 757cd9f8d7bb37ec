//! Open-data portal server
//!
//! Loads the configuration, seeds the user store, registers the CSV exports
//! and serves the HTTP API until Ctrl+C or SIGTERM.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use opendata_api::{build_router, AppState, InMemoryUserStore};
use opendata_core::MetricRegistry;
use opendata_export::{register_user_exports, AdapterRegistry, Streamer};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Cli, ServerConfig};

fn init_tracing(config: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(&cli).context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Initializing state...");

    let store = match &config.users_fixture {
        Some(path) => InMemoryUserStore::from_fixture(path)
            .await
            .with_context(|| format!("Failed to seed users from {}", path.display()))?,
        None => InMemoryUserStore::default(),
    };

    let mut adapters = AdapterRegistry::new();
    let mut metrics = MetricRegistry::new();
    register_user_exports(&mut adapters, &mut metrics);
    info!(kinds = ?adapters.kinds(), metrics = metrics.len(), "Registered CSV exports");

    let secret_key = config.secret_key.take().unwrap_or_else(|| {
        warn!("No secret key configured, issued API keys will not survive a restart");
        SecretString::new(ulid::Ulid::new().to_string())
    });

    let streamer = Streamer::new(Arc::new(adapters), Arc::new(metrics));
    let state = AppState::new(Arc::new(store), streamer, secret_key)
        .with_export_basename(config.export_basename.clone());

    if let Some(target) = &config.issue_apikey {
        let apikey = issue_startup_key(&state, target)
            .await
            .with_context(|| format!("Failed to issue an API key for {target}"))?;
        println!("{apikey}");
    }

    let app = build_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Mint a key for `target` so a fresh deployment has a first admin key.
async fn issue_startup_key(state: &AppState, target: &str) -> Result<String> {
    let user = state.find_user(target).await?;
    let apikey = state.issue_api_key(&user.id).await?;
    info!(user_id = %user.id, "Issued startup API key");
    Ok(apikey)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
