//! Connection-to-user bindings.

use dashmap::DashMap;
use uuid::Uuid;

/// Transport-level connection identifier.
pub type ConnId = Uuid;

/// Maps a transport connection to the authenticated user it belongs to.
///
/// A connection binds to at most one user; a user may hold several concurrent
/// connections. Operations on unknown connections are no-ops.
#[derive(Default)]
pub struct ConnectionRegistry {
    bindings: DashMap<ConnId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Bind `conn_id` to `user_id`. Idempotent; if the connection was bound
    /// to a different user, the new attribution wins. Returns the previously
    /// bound user, if any.
    pub fn attach(&self, conn_id: ConnId, user_id: &str) -> Option<String> {
        self.bindings.insert(conn_id, user_id.to_string())
    }

    /// Remove the binding, returning the user it pointed to.
    pub fn detach(&self, conn_id: ConnId) -> Option<String> {
        self.bindings.remove(&conn_id).map(|(_, user_id)| user_id)
    }

    /// Look up the user bound to a connection.
    pub fn user_for(&self, conn_id: ConnId) -> Option<String> {
        self.bindings.get(&conn_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every binding (administrative reset).
    pub fn clear(&self) {
        self.bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_detach_roundtrip() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();

        assert_eq!(registry.attach(conn, "alice"), None);
        assert_eq!(registry.user_for(conn), Some("alice".to_string()));
        assert_eq!(registry.detach(conn), Some("alice".to_string()));
        assert_eq!(registry.user_for(conn), None);
    }

    #[test]
    fn reattach_wins() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();

        registry.attach(conn, "alice");
        assert_eq!(registry.attach(conn, "bob"), Some("alice".to_string()));
        assert_eq!(registry.user_for(conn), Some("bob".to_string()));
    }

    #[test]
    fn unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.detach(Uuid::new_v4()), None);
    }
}
