//! Prometheus scrape endpoint.
//!
//! Kept off the API listener on its own port so operators can firewall it
//! separately. Port 0 disables it entirely.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tracing::{error, info};

/// Router serving `GET /metrics` in Prometheus text format.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(|| async { crate::metrics::gather_metrics() }))
}

/// Serve the metrics endpoint on `0.0.0.0:port` until the process exits.
/// Spawn this as a background task; bind or serve failures are logged, not
/// propagated - metrics are never worth taking the API down for.
pub async fn run_metrics_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind metrics listener");
            return;
        }
    };
    info!(addr = %addr, "Metrics endpoint listening");

    if let Err(e) = axum::serve(listener, metrics_router()).await {
        error!(error = %e, "Metrics server exited");
    }
}
