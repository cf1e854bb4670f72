//! Room membership tracking.
//!
//! Rooms and channels share one flat namespace. Membership is scoped to the
//! transport session: it is discarded on disconnect and not restored on
//! reconnect - the client must rejoin.

use super::connections::ConnId;
use dashmap::{DashMap, DashSet};

/// Maps room names to the set of connections subscribed to them.
#[derive(Default)]
pub struct RoomManager {
    rooms: DashMap<String, DashSet<ConnId>>,
    /// Reverse index for disconnect cleanup.
    memberships: DashMap<ConnId, DashSet<String>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Subscribe a connection to a room. Joining twice is a no-op; a member
    /// still receives exactly one copy of each event.
    pub fn join(&self, conn_id: ConnId, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id);
        self.memberships
            .entry(conn_id)
            .or_default()
            .insert(room.to_string());
    }

    /// Connections currently subscribed to a room.
    pub fn members(&self, room: &str) -> Vec<ConnId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    /// Remove a connection from every room it joined. Rooms left empty are
    /// dropped entirely.
    pub fn drop_connection(&self, conn_id: ConnId) {
        let Some((_, rooms)) = self.memberships.remove(&conn_id) else {
            return;
        };
        for room in rooms {
            if let Some(members) = self.rooms.get(&room) {
                members.remove(&conn_id);
            }
            self.rooms.remove_if(&room, |_, members| members.is_empty());
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop all membership state (administrative reset).
    pub fn clear(&self) {
        self.rooms.clear();
        self.memberships.clear();
    }
}
