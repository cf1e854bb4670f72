//! Shared in-memory state: presence, connection bindings, room membership,
//! and the event broadcaster.
//!
//! These registries are the only shared mutable resources in the process;
//! everything else lives in the database. They are created once at startup
//! and cleared only by the administrative reset. None of it survives a
//! restart, by design.

mod broadcast;
mod connections;
pub mod events;
mod presence;
mod rooms;

pub use broadcast::Broadcaster;
pub use connections::{ConnId, ConnectionRegistry};
pub use events::{Event, Target};
pub use presence::{DirectoryMember, OnlineUser, PresenceStore, Sweep};
pub use rooms::RoomManager;

use tracing::info;

/// The shared real-time state, handed to every request and socket task as
/// `Arc<Hub>`.
///
/// No operation ever holds locks on two registries at once; each dashmap
/// serializes its own mutations.
pub struct Hub {
    pub presence: PresenceStore,
    pub connections: ConnectionRegistry,
    pub rooms: RoomManager,
    pub broadcaster: Broadcaster,
}

impl Hub {
    pub fn new(send_queue_capacity: usize) -> Self {
        Self {
            presence: PresenceStore::new(),
            connections: ConnectionRegistry::new(),
            rooms: RoomManager::new(),
            broadcaster: Broadcaster::new(send_queue_capacity),
        }
    }

    /// Attribute a connection to a user. The newest attribution wins; the
    /// user's presence record is created if this is their first sign of life.
    pub fn attach(&self, conn_id: ConnId, user_id: &str, display_name: &str) {
        if let Some(previous) = self.connections.attach(conn_id, user_id)
            && previous != user_id
        {
            self.presence.clear_connection_of(&previous, conn_id);
        }
        self.presence.attribute(user_id, display_name, conn_id);
    }

    /// Tear down everything scoped to a connection: its user binding, the
    /// connection reference in presence, room memberships, and the outbound
    /// queue. Called on every disconnect, clean or not. Returns the user the
    /// connection belonged to, if it was ever attributed.
    ///
    /// The user's presence record survives; only logout or the sweep removes it.
    pub fn detach(&self, conn_id: ConnId) -> Option<String> {
        let user_id = self.connections.detach(conn_id);
        self.presence.clear_connection(conn_id);
        self.rooms.drop_connection(conn_id);
        self.broadcaster.unregister(conn_id);
        user_id
    }

    /// Subscribe a connection to a room and acknowledge with a `joined_room`
    /// event delivered to that connection only.
    pub fn join_room(&self, conn_id: ConnId, room: &str) {
        self.rooms.join(conn_id, room);
        self.broadcaster.send_to(
            conn_id,
            &Event::JoinedRoom {
                room: room.to_string(),
            },
        );
    }

    /// Publish an event to its target. Fire-and-forget; returns recipients.
    pub fn publish(&self, event: &Event, target: &Target) -> usize {
        self.broadcaster.publish(event, target, &self.rooms)
    }

    /// Administrative reset: drop all presence, bindings, and memberships.
    /// Outbound queues stay registered so connected clients keep receiving
    /// events after the wipe.
    pub fn reset(&self) {
        self.presence.clear();
        self.connections.clear();
        self.rooms.clear();
        info!("In-memory registries reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    const THRESHOLD: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn detach_cleans_connection_scope_but_not_presence() {
        let hub = Hub::new(8);
        let conn = Uuid::new_v4();

        let _rx = hub.broadcaster.register(conn);
        hub.attach(conn, "alice", "Alice");
        hub.join_room(conn, "general");
        hub.join_room(conn, "emergency");

        assert_eq!(hub.detach(conn), Some("alice".to_string()));

        assert!(hub.rooms.members("general").is_empty());
        assert!(hub.rooms.members("emergency").is_empty());
        assert_eq!(hub.connections.len(), 0);
        assert_eq!(hub.broadcaster.connection_count(), 0);

        // Presence survives the disconnect with its connection cleared.
        assert!(hub.presence.is_online("alice", THRESHOLD));
        assert_eq!(hub.presence.connection_for("alice"), None);
    }

    #[tokio::test]
    async fn join_room_acknowledges_joiner_only() {
        let hub = Hub::new(8);
        let joiner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut joiner_rx = hub.broadcaster.register(joiner);
        let mut other_rx = hub.broadcaster.register(other);

        hub.join_room(joiner, "general");

        let frame = joiner_rx.try_recv().unwrap();
        assert!(frame.contains("joined_room"));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reattach_moves_connection_to_new_user() {
        let hub = Hub::new(8);
        let conn = Uuid::new_v4();

        hub.attach(conn, "alice", "Alice");
        hub.attach(conn, "bob", "Bob");

        assert_eq!(hub.connections.user_for(conn), Some("bob".to_string()));
        assert_eq!(hub.presence.connection_for("bob"), Some(conn));
        // The re-attribution cleared the connection off Alice's record.
        assert_eq!(hub.presence.connection_for("alice"), None);

        hub.detach(conn);
        assert_eq!(hub.presence.connection_for("bob"), None);
    }

    #[tokio::test]
    async fn reset_clears_registries_but_keeps_queues() {
        let hub = Hub::new(8);
        let conn = Uuid::new_v4();

        let mut rx = hub.broadcaster.register(conn);
        hub.attach(conn, "alice", "Alice");
        hub.join_room(conn, "general");
        let _ = rx.try_recv();

        hub.reset();

        assert!(hub.presence.is_empty());
        assert!(hub.connections.is_empty());
        assert_eq!(hub.rooms.room_count(), 0);

        // Still broadcastable after reset.
        let delivered = hub.publish(&Event::user_offline("alice"), &Target::Broadcast);
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
    }
}
