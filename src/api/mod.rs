//! HTTP API and WebSocket transport.
//!
//! One axum router carries the JSON API under `/api` and the socket upgrade
//! at `/ws`. Every state-changing handler writes to the database first and
//! publishes its event only after the write succeeded.

mod admin;
mod auth;
mod extract;
mod incidents;
mod locations;
mod messages;
mod reports;
mod users;
mod ws;

pub use extract::AuthUser;

use crate::config::Config;
use crate::db::Database;
use crate::state::Hub;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub hub: Arc<Hub>,
}

impl AppState {
    /// The configured offline threshold.
    pub fn offline_threshold(&self) -> std::time::Duration {
        self.config.presence.offline_threshold()
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/users", get(users::list_users))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/online-status", post(users::online_status))
        .route("/users/heartbeat", post(users::heartbeat))
        .route("/users/online", get(users::online_users))
        .route("/users/logout", post(users::logout))
        .route("/users/by-status", get(users::by_status))
        .route("/incidents", post(incidents::create).get(incidents::list))
        .route(
            "/incidents/:id",
            get(incidents::get_one)
                .put(incidents::update)
                .delete(incidents::delete),
        )
        .route("/incidents/:id/assign", put(incidents::assign))
        .route("/incidents/:id/complete", put(incidents::complete))
        .route("/messages", get(messages::list).post(messages::send))
        .route("/messages/:id", delete(messages::delete))
        .route("/locations/update", post(locations::update))
        .route("/locations/live", get(locations::live))
        .route("/reports", post(reports::create).get(reports::list))
        .route("/reports/folders", get(reports::folders))
        .route("/reports/:id", put(reports::update))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/create-first-user", post(admin::create_first_user))
        .route("/admin/reset", delete(admin::reset));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}

/// Root info endpoint.
async fn root(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": state.config.server.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
