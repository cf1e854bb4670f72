//! Channel message endpoints.

use super::{AppState, AuthUser};
use crate::db::messages::NewMessage;
use crate::db::models::Message;
use crate::error::{ApiError, ApiResult};
use crate::state::{Event, Target};
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

/// How many messages a channel listing returns.
const CHANNEL_HISTORY_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "general".to_string()
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = state
        .db
        .messages()
        .list_for_channel(&query.channel, CHANNEL_HISTORY_LIMIT)
        .await?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub recipient_id: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    "text".to_string()
}

/// Persist a message, then announce it to the channel room.
pub async fn send(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<Message>> {
    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let message = state
        .db
        .messages()
        .create(NewMessage {
            content: &request.content,
            sender_id: &user.id,
            sender_name: &user.username,
            recipient_id: request.recipient_id.as_deref(),
            channel: &request.channel,
            message_type: &request.message_type,
        })
        .await?;

    state.hub.presence.touch_on_activity(&user.id);
    state.hub.publish(
        &Event::NewMessage(message.clone()),
        &Target::Room(request.channel),
    );

    Ok(Json(message))
}

/// Delete a message (sender or admin) and announce the deletion to everyone,
/// since clients on any channel view may still render it.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let message = state
        .db
        .messages()
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("message"))?;

    if message.sender_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if !state.db.messages().delete(&id).await? {
        return Err(ApiError::NotFound("message"));
    }

    state.hub.publish(
        &Event::MessageDeleted {
            message_id: id,
            channel: message.channel,
        },
        &Target::Broadcast,
    );

    Ok(Json(
        json!({"status": "success", "message": "message deleted"}),
    ))
}
