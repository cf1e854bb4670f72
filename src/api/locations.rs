//! Live location endpoints.

use super::{AppState, AuthUser};
use crate::db::models::{GeoPoint, LocationPing};
use crate::error::ApiResult;
use crate::state::{Event, Target};
use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

/// How far back the live view reaches (seconds).
const LIVE_WINDOW_SECS: i64 = 600;

#[derive(Deserialize)]
pub struct LocationUpdateRequest {
    pub location: GeoPoint,
}

/// Store a location ping for the caller, then announce it to everyone.
/// The caller's identity always wins over anything in the body.
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<LocationUpdateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let now = chrono::Utc::now();
    let ping = LocationPing {
        user_id: user.id.clone(),
        location: request.location,
        timestamp: now.timestamp(),
    };

    state.db.locations().record(&ping).await?;

    state.hub.presence.touch_on_activity(&user.id);
    state.hub.publish(
        &Event::LocationUpdated {
            user_id: user.id,
            location: request.location,
            timestamp: now.to_rfc3339(),
        },
        &Target::Broadcast,
    );

    Ok(Json(json!({"status": "success"})))
}

/// Latest ping per user within the live window.
pub async fn live(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> ApiResult<Json<Vec<LocationPing>>> {
    let cutoff = chrono::Utc::now().timestamp() - LIVE_WINDOW_SECS;
    Ok(Json(state.db.locations().latest_since(cutoff).await?))
}
