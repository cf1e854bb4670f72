//! WebSocket transport boundary.
//!
//! Each connection gets a fresh connection id, a bounded outbound queue
//! drained by a writer task, and a reader loop for inbound frames. Events for
//! one connection leave in publish order; nothing is ordered across
//! connections or relative to HTTP responses.

use super::AppState;
use crate::db::messages::NewMessage;
use crate::db::models::{GeoPoint, LocationPing};
use crate::state::{ConnId, Event, Target};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Inbound frames, `{"event": "...", "data": {...}}` like the outbound side.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum InboundFrame {
    JoinRoom {
        #[serde(default = "default_room")]
        room: String,
    },
    SendMessage {
        #[serde(default = "default_room")]
        room: String,
        message: String,
        sender: String,
    },
    LocationUpdate {
        user_id: String,
        location: GeoPoint,
    },
}

fn default_room() -> String {
    "general".to_string()
}

/// GET /ws - upgrade to a WebSocket session.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id: ConnId = Uuid::new_v4();
    crate::metrics::client_connected();
    debug!(conn_id = %conn_id, "Client connected");

    let mut outbound = state.hub.broadcaster.register(conn_id);
    let (mut sink, mut stream) = socket.split();

    // Writer: drain the bounded queue into the socket. Ends when the queue is
    // closed (disconnect) or the peer stops accepting writes.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    // Reader: process inbound frames until the peer goes away, cleanly or not.
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Socket read error");
                break;
            }
        };

        match message {
            Message::Text(text) => handle_frame(&state, conn_id, &text).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // protocol.
            _ => {}
        }
    }

    // Connection-scoped teardown runs on every exit path.
    state.hub.detach(conn_id);
    writer.abort();
    crate::metrics::client_disconnected();
    debug!(conn_id = %conn_id, "Client disconnected");
}

async fn handle_frame(state: &AppState, conn_id: ConnId, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn_id = %conn_id, error = %e, "Ignoring malformed frame");
            return;
        }
    };

    match frame {
        InboundFrame::JoinRoom { room } => {
            state.hub.join_room(conn_id, &room);
        }
        InboundFrame::SendMessage {
            room,
            message,
            sender,
        } => {
            handle_send_message(state, conn_id, room, message, sender).await;
        }
        InboundFrame::LocationUpdate { user_id, location } => {
            handle_location_update(state, conn_id, user_id, location).await;
        }
    }
}

async fn handle_send_message(
    state: &AppState,
    conn_id: ConnId,
    room: String,
    message: String,
    sender: String,
) {
    // The sender id attributes this connection; an id we have never seen
    // cannot produce a message row.
    let user = match state.db.users().find_by_id(&sender).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(conn_id = %conn_id, sender = %sender, "Message from unknown sender ignored");
            return;
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Sender lookup failed");
            return;
        }
    };

    state.hub.attach(conn_id, &user.id, &user.username);
    state.hub.presence.touch_on_activity(&user.id);

    let stored = state
        .db
        .messages()
        .create(NewMessage {
            content: &message,
            sender_id: &user.id,
            sender_name: &user.username,
            recipient_id: None,
            channel: &room,
            message_type: "text",
        })
        .await;

    // Broadcast only after the write is acknowledged; a failed write
    // suppresses the event entirely.
    match stored {
        Ok(stored) => {
            state
                .hub
                .publish(&Event::NewMessage(stored), &Target::Room(room));
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to persist socket message");
        }
    }
}

async fn handle_location_update(
    state: &AppState,
    conn_id: ConnId,
    user_id: String,
    location: GeoPoint,
) {
    match state.db.users().find_by_id(&user_id).await {
        Ok(Some(user)) => {
            state.hub.attach(conn_id, &user.id, &user.username);
            state.hub.presence.touch_on_activity(&user.id);
        }
        Ok(None) => {
            debug!(conn_id = %conn_id, user_id = %user_id, "Location from unknown user ignored");
            return;
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "User lookup failed");
            return;
        }
    }

    let now = chrono::Utc::now();
    let ping = LocationPing {
        user_id: user_id.clone(),
        location,
        timestamp: now.timestamp(),
    };

    match state.db.locations().record(&ping).await {
        Ok(()) => {
            state.hub.publish(
                &Event::LocationUpdated {
                    user_id,
                    location,
                    timestamp: now.to_rfc3339(),
                },
                &Target::Broadcast,
            );
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to persist location ping");
        }
    }
}
