use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use cvbuilder_core::MemoryStore;
use cvbuilder_server::{build_router, rate_limit::spawn_cleanup, AppState, ServerConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Use RUST_LOG to override, e.g. `RUST_LOG=cvbuilder_server=debug,tower_http=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    let store = Arc::new(match &config.data_file {
        Some(path) => MemoryStore::open(path)
            .with_context(|| format!("Failed to open data file {}", path.display()))?,
        None => MemoryStore::new(),
    });

    let addr = config.bind_addr()?;
    let state = AppState::new(config, store);

    let seeded = state
        .templates
        .ensure_defaults()
        .await
        .context("Failed to seed templates")?;
    if seeded > 0 {
        info!(count = seeded, "Seeded default templates");
    }
    spawn_cleanup(state.rate_limiter.clone());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
