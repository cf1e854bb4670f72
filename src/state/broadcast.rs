//! Event fan-out to connected clients.
//!
//! Delivery is fire-and-forget: each connection has a bounded outbound queue,
//! and an event that finds the queue full or closed is dropped for that
//! connection. Nothing here ever propagates a failure to the caller that
//! triggered the publish.

use super::connections::ConnId;
use super::events::{Event, Target};
use super::rooms::RoomManager;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Pre-serialized event frame shared across recipients.
pub type Frame = Arc<str>;

/// Registry of per-connection outbound queues and the publish fan-out.
pub struct Broadcaster {
    senders: DashMap<ConnId, mpsc::Sender<Frame>>,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            senders: DashMap::new(),
            queue_capacity,
        }
    }

    /// Register a connection, returning the receiving half its writer task
    /// drains.
    pub fn register(&self, conn_id: ConnId) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.senders.insert(conn_id, tx);
        rx
    }

    /// Remove a connection's queue. Unknown connections are a no-op.
    pub fn unregister(&self, conn_id: ConnId) {
        self.senders.remove(&conn_id);
    }

    /// Publish an event to a room or to every live connection. Returns the
    /// number of queues the frame was handed to.
    ///
    /// Connections that vanished between enumeration and send, and
    /// connections whose queue is full (a slow or stuck client), are skipped
    /// silently. There is no retry and no persistence of missed events.
    pub fn publish(&self, event: &Event, target: &Target, rooms: &RoomManager) -> usize {
        let frame = match Self::encode(event) {
            Some(frame) => frame,
            None => return 0,
        };

        let delivered = match target {
            Target::Room(room) => {
                let mut delivered = 0;
                for conn_id in rooms.members(room) {
                    delivered += self.deliver(conn_id, frame.clone()) as usize;
                }
                delivered
            }
            Target::Broadcast => {
                // Copy the recipient list first so the send loop does not
                // hold a shard lock while pushing into queues.
                let conn_ids: Vec<ConnId> =
                    self.senders.iter().map(|entry| *entry.key()).collect();
                let mut delivered = 0;
                for conn_id in conn_ids {
                    delivered += self.deliver(conn_id, frame.clone()) as usize;
                }
                delivered
            }
        };

        crate::metrics::event_published(event.kind(), delivered);
        debug!(kind = event.kind(), delivered, "Event published");
        delivered
    }

    /// Deliver an event to a single connection (room-join acknowledgments).
    pub fn send_to(&self, conn_id: ConnId, event: &Event) -> bool {
        let Some(frame) = Self::encode(event) else {
            return false;
        };
        let delivered = self.deliver(conn_id, frame);
        crate::metrics::event_published(event.kind(), delivered as usize);
        delivered
    }

    fn encode(event: &Event) -> Option<Frame> {
        match serde_json::to_string(event) {
            Ok(json) => Some(Arc::from(json.as_str())),
            Err(e) => {
                // Serialization of our own types should never fail; if it
                // does, dropping the event is the only fire-and-forget move.
                tracing::error!(kind = event.kind(), error = %e, "Failed to encode event");
                None
            }
        }
    }

    fn deliver(&self, conn_id: ConnId, frame: Frame) -> bool {
        let Some(sender) = self.senders.get(&conn_id) else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                crate::metrics::event_dropped();
                debug!(conn_id = %conn_id, error = %e, "Dropped event for connection");
                false
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_event() -> Event {
        Event::UserOffline {
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn room_publish_reaches_members_only() {
        let rooms = RoomManager::new();
        let broadcaster = Broadcaster::new(8);
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();

        let mut member_rx = broadcaster.register(member);
        let mut outsider_rx = broadcaster.register(outsider);
        rooms.join(member, "emergency");

        let delivered =
            broadcaster.publish(&test_event(), &Target::Room("emergency".into()), &rooms);
        assert_eq!(delivered, 1);

        let frame = member_rx.try_recv().unwrap();
        assert!(frame.contains("user_offline"));
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn double_join_delivers_once() {
        let rooms = RoomManager::new();
        let broadcaster = Broadcaster::new(8);
        let conn = Uuid::new_v4();

        let mut rx = broadcaster.register(conn);
        rooms.join(conn, "general");
        rooms.join(conn, "general");

        broadcaster.publish(&test_event(), &Target::Room("general".into()), &rooms);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "exactly one copy expected");
    }

    #[tokio::test]
    async fn broadcast_reaches_all() {
        let rooms = RoomManager::new();
        let broadcaster = Broadcaster::new(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut rx_a = broadcaster.register(a);
        let mut rx_b = broadcaster.register(b);

        let delivered = broadcaster.publish(&test_event(), &Target::Broadcast, &rooms);
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_queue_drops_silently() {
        let rooms = RoomManager::new();
        let broadcaster = Broadcaster::new(1);
        let conn = Uuid::new_v4();

        let _rx = broadcaster.register(conn);
        assert_eq!(broadcaster.publish(&test_event(), &Target::Broadcast, &rooms), 1);
        // Queue is now full; the next publish drops without error.
        assert_eq!(broadcaster.publish(&test_event(), &Target::Broadcast, &rooms), 0);
    }

    #[tokio::test]
    async fn vanished_connection_is_skipped() {
        let rooms = RoomManager::new();
        let broadcaster = Broadcaster::new(8);
        let conn = Uuid::new_v4();

        let _rx = broadcaster.register(conn);
        rooms.join(conn, "general");
        broadcaster.unregister(conn);

        // Membership still lists the connection, but its queue is gone.
        let delivered =
            broadcaster.publish(&test_event(), &Target::Room("general".into()), &rooms);
        assert_eq!(delivered, 0);
    }
}
