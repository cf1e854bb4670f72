//! Administrative endpoints.

use super::{AppState, AuthUser};
use crate::db::models::User;
use crate::db::users::NewUser;
use crate::error::{ApiError, ApiResult};
use crate::security::password;
use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Aggregate counters for the dashboard (admin only).
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let total_users = state.db.users().count().await?;
    let total_incidents = state.db.incidents().count().await?;
    let open_incidents = state.db.incidents().count_open().await?;
    let total_messages = state.db.messages().count().await?;

    Ok(Json(json!({
        "total_users": total_users,
        "total_incidents": total_incidents,
        "open_incidents": open_incidents,
        "total_messages": total_messages,
    })))
}

#[derive(Deserialize)]
pub struct FirstUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Bootstrap the very first account. Unauthenticated by necessity, but only
/// works while the users table is empty; the created account is always an
/// admin.
pub async fn create_first_user(
    State(state): State<AppState>,
    Json(request): Json<FirstUserRequest>,
) -> ApiResult<Json<User>> {
    if state.db.users().count().await? > 0 {
        return Err(ApiError::BadRequest(
            "users already exist; use normal registration".into(),
        ));
    }

    let password_hash = password::hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let user = state
        .db
        .users()
        .create(NewUser {
            email: &request.email,
            username: &request.username,
            password_hash: &password_hash,
            role: crate::db::models::role::ADMIN,
            badge_number: None,
            department: None,
            phone: None,
            service_number: None,
            rank: None,
        })
        .await?;

    Ok(Json(user))
}

/// Wipe the database and the in-memory registries (admin only).
///
/// This is the one sanctioned way the presence/connection/room state is ever
/// reset while the process runs.
pub async fn reset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    warn!(admin = %user.username, "Administrative reset requested");

    let deleted = state.db.wipe_all().await?;
    state.hub.reset();

    Ok(Json(json!({
        "status": "success",
        "documents_deleted": deleted,
    })))
}
