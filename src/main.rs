//! kiezwached - community watch coordination server.
//!
//! One process serves the JSON API, the WebSocket event stream, and an
//! optional Prometheus metrics endpoint. Presence lives in memory only.

mod api;
mod config;
mod db;
mod error;
mod http;
mod metrics;
mod security;
mod state;


use crate::config::Config;
use crate::db::Database;
use crate::state::Hub;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        "Starting kiezwached"
    );

    // Every bearer token is signed with [auth].token_secret; a guessable
    // secret means forgeable sessions for every account. A config copied
    // straight from the shipped example must not make it into service.
    if security::is_weak_secret(&config.auth.token_secret) {
        match std::env::var("KIEZWACHE_ALLOW_INSECURE_SECRET") {
            Ok(_) => tracing::warn!(
                "token_secret is weak; continuing only because KIEZWACHE_ALLOW_INSECURE_SECRET is set"
            ),
            Err(_) => {
                error!(
                    "token_secret is still the placeholder or shorter than 16 characters; \
                     refusing to start. Put a long random value in [auth].token_secret, \
                     or set KIEZWACHE_ALLOW_INSECURE_SECRET=1 for throwaway local runs."
                );
                anyhow::bail!("insecure token_secret");
            }
        }
    }

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Shared in-memory registries: presence, connections, rooms, broadcaster.
    // Created once here; only the administrative reset ever clears them.
    let hub = Arc::new(Hub::new(config.presence.send_queue_capacity));

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(async move {
            http::run_metrics_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let state = api::AppState {
        config: Arc::new(config),
        db,
        hub,
    };
    let listen = state.config.server.listen;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(addr = %listen, "API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
