//! Domain events fanned out to connected clients.
//!
//! Events serialize to `{"event": "<kind>", "data": {...}}` text frames.
//! Payloads carry the full entity, not a diff, so a client that missed
//! earlier events can reconstruct current state from any single one.

use crate::db::models::{GeoPoint, Incident, Message};
use serde::Serialize;

/// A typed domain event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    NewMessage(Message),
    MessageDeleted {
        message_id: String,
        channel: String,
    },
    NewIncident(Incident),
    IncidentAssigned {
        incident_id: String,
        assigned_to: String,
        incident: Incident,
    },
    IncidentUpdated(Incident),
    IncidentCompleted {
        incident_id: String,
        completed_by: String,
        archived_as: String,
    },
    LocationUpdated {
        user_id: String,
        location: GeoPoint,
        timestamp: String,
    },
    UserOnline {
        user_id: String,
        username: String,
        timestamp: String,
    },
    UserOffline {
        user_id: String,
    },
    JoinedRoom {
        room: String,
    },
}

impl Event {
    /// Stable kind label, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::NewIncident(_) => "new_incident",
            Self::IncidentAssigned { .. } => "incident_assigned",
            Self::IncidentUpdated(_) => "incident_updated",
            Self::IncidentCompleted { .. } => "incident_completed",
            Self::LocationUpdated { .. } => "location_updated",
            Self::UserOnline { .. } => "user_online",
            Self::UserOffline { .. } => "user_offline",
            Self::JoinedRoom { .. } => "joined_room",
        }
    }

    /// Convenience constructor for the offline notification.
    pub fn user_offline(user_id: impl Into<String>) -> Self {
        Self::UserOffline {
            user_id: user_id.into(),
        }
    }
}

/// Where an event is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every connection subscribed to the named room.
    Room(String),
    /// Every live connection.
    Broadcast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_event_plus_data() {
        let event = Event::UserOffline {
            user_id: "u1".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "user_offline");
        assert_eq!(json["data"]["user_id"], "u1");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let event = Event::JoinedRoom {
            room: "general".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.kind());
    }
}
