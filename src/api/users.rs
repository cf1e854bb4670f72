//! User directory and presence endpoints.
//!
//! The presence endpoints are the HTTP side of the real-time core: marking
//! online, heartbeats, the lazily-sweeping online list, logout, and the
//! by-status directory view.

use super::{AppState, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::{DirectoryMember, Event, OnlineUser, Target};
use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;

/// Mark the caller online. Announces `user_online` to everyone, but only when
/// this actually transitioned the user from offline to online; a refresh
/// while already online stays silent.
pub async fn online_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<serde_json::Value> {
    let came_online =
        state
            .hub
            .presence
            .mark_online(&user.id, &user.username, state.offline_threshold());

    let now = chrono::Utc::now();
    if came_online {
        state.hub.publish(
            &Event::UserOnline {
                user_id: user.id.clone(),
                username: user.username.clone(),
                timestamp: now.to_rfc3339(),
            },
            &Target::Broadcast,
        );
    }

    Json(json!({
        "status": "online",
        "user_id": user.id,
        "timestamp": now.to_rfc3339(),
    }))
}

/// Refresh the caller's last-seen timestamp. Never announces anything.
pub async fn heartbeat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<serde_json::Value> {
    state.hub.presence.heartbeat(&user.id, &user.username);

    Json(json!({
        "status": "heartbeat",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// List currently online users.
///
/// This is the sweep trigger: entries past the offline threshold are evicted
/// here, and a `user_offline` event goes out for each before the response is
/// returned.
pub async fn online_users(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Json<Vec<OnlineUser>> {
    let sweep = state.hub.presence.snapshot(state.offline_threshold());

    for user_id in &sweep.evicted {
        state
            .hub
            .publish(&Event::user_offline(user_id.clone()), &Target::Broadcast);
    }

    Json(sweep.online)
}

/// Explicit logout: remove the caller's presence and announce it.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<serde_json::Value> {
    state.hub.presence.mark_offline(&user.id);
    state
        .hub
        .publish(&Event::user_offline(user.id.clone()), &Target::Broadcast);

    Json(json!({
        "status": "logged_out",
        "user_id": user.id,
    }))
}

/// Users grouped by work status, each annotated with presence information.
/// Read-only composition; no eviction happens on this path.
pub async fn by_status(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> ApiResult<Json<std::collections::BTreeMap<String, Vec<serde_json::Value>>>> {
    let users = state.db.users().list_all().await?;

    let members = users
        .into_iter()
        .map(|user| {
            let details = serde_json::to_value(&user).unwrap_or_default();
            DirectoryMember {
                user_id: user.id,
                work_status: user.status,
                details,
            }
        })
        .collect();

    let grouped = state
        .hub
        .presence
        .grouped_by_status(members, state.offline_threshold());

    Ok(Json(grouped))
}

/// Full user directory (admin only).
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<crate::db::models::User>>> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(state.db.users().list_all().await?))
}

/// Delete a user account (admin only, never yourself).
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if id == user.id {
        return Err(ApiError::BadRequest("cannot delete yourself".into()));
    }

    if !state.db.users().delete(&id).await? {
        return Err(ApiError::NotFound("user"));
    }

    // A deleted user cannot be online anymore.
    state.hub.presence.mark_offline(&id);

    Ok(Json(json!({"status": "success", "message": "user deleted"})))
}
