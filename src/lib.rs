use anyhow::{Context, Result};
use axum::Router;
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{info, warn};

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod flash;
pub mod manager;
pub mod models;
pub mod pages;
pub mod pdf;
pub mod report;
pub mod routes;
pub mod schema;
pub mod state;
pub mod uploads;

use crate::config::Settings;
use crate::state::AppState;

/// Builds the full application: every route behind session handling and request tracing.
pub fn app(state: AppState) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    routes::router(state)
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(settings: Settings) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_settings(&settings)?;

    info!("Starting server...");
    let address = &settings.server.bind;

    let listener = TcpListener::bind(address.as_str())
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await
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
