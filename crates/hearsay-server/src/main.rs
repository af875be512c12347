//! # hearsay-server
//!
//! Chat relay + API server for Hearsay.
//!
//! This binary provides:
//! - **WebSocket delivery hub**: a presence registry (first identify wins),
//!   per-chat rooms, dual-channel message fanout and direct-only deletion
//!   notices
//! - **REST API** (axum) for chat lists, history, message append and soft
//!   deletion
//! - **SQLite persistence** via `hearsay-store`

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hearsay_store::Database;

use hearsay_server::api::{self, AppState};
use hearsay_server::config::ServerConfig;
use hearsay_server::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hearsay_server=debug")),
        )
        .init();

    info!("Starting Hearsay server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(instance = %config.instance_name, "Instance settings");

    // -----------------------------------------------------------------------
    // 3. Open storage
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    // -----------------------------------------------------------------------
    // 4. Delivery hub + application state
    // -----------------------------------------------------------------------
    let hub = Hub::new();
    let http_addr = config.http_addr;

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        hub,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP + WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the server or a shutdown signal
    // arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
