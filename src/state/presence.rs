//! Process-wide presence tracking.
//!
//! The authoritative "who is online" state. A user is online while their
//! `last_seen` is within the offline threshold; absence from the store means
//! known-offline. Stale entries are evicted lazily by [`PresenceStore::snapshot`]
//! on the online-list read path - there is no background sweep timer, so a
//! stale entry that nobody queries simply waits for the next read.

use super::connections::ConnId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Presence record for one user.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    /// Display name, snapshotted when presence was first set. Not live-updated
    /// if the user later renames.
    pub display_name: String,
    /// Monotonically non-decreasing while the user stays online.
    pub last_seen: DateTime<Utc>,
    /// The most recent transport connection attributed to this user, if any.
    /// A user can be online via heartbeat alone, with no live connection.
    pub connection_id: Option<ConnId>,
}

/// One entry of the online-user list.
#[derive(Debug, Clone, Serialize)]
pub struct OnlineUser {
    pub user_id: String,
    pub username: String,
    pub last_seen: String,
    pub minutes_ago: i64,
}

/// Result of a [`PresenceStore::snapshot`]: the fresh entries and the users
/// evicted as stale during the same pass.
#[derive(Debug, Default)]
pub struct Sweep {
    pub online: Vec<OnlineUser>,
    pub evicted: Vec<String>,
}

/// A directory entry joined against presence by [`PresenceStore::grouped_by_status`].
pub struct DirectoryMember {
    pub user_id: String,
    pub work_status: String,
    /// Serialized user object the presence annotations are injected into.
    pub details: serde_json::Value,
}

/// Process-wide user presence registry.
///
/// Initialized once at startup; only the administrative reset clears it.
#[derive(Default)]
pub struct PresenceStore {
    records: DashMap<String, PresenceRecord>,
}

fn is_stale(last_seen: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now.signed_duration_since(last_seen).num_seconds() > threshold.as_secs() as i64
}

impl PresenceStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Mark a user online now. Returns whether the user transitioned from
    /// offline (absent or stale) to online, which callers use to decide
    /// whether to announce a `user_online` event.
    pub fn mark_online(&self, user_id: &str, display_name: &str, threshold: Duration) -> bool {
        self.mark_online_at(user_id, display_name, threshold, Utc::now())
    }

    pub fn mark_online_at(
        &self,
        user_id: &str,
        display_name: &str,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let came_online = match self.records.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                let was_stale = is_stale(record.last_seen, now, threshold);
                // Out-of-order arrivals must not regress last_seen.
                record.last_seen = record.last_seen.max(now);
                was_stale
            }
            Entry::Vacant(entry) => {
                entry.insert(PresenceRecord {
                    display_name: display_name.to_string(),
                    last_seen: now,
                    connection_id: None,
                });
                true
            }
        };
        crate::metrics::set_presence_records(self.records.len() as i64);
        came_online
    }

    /// Refresh a user's liveness without an online/offline transition signal.
    /// Creates the record if absent. The HTTP heartbeat endpoint uses this;
    /// it never announces anything.
    pub fn heartbeat(&self, user_id: &str, display_name: &str) {
        self.heartbeat_at(user_id, display_name, Utc::now());
    }

    pub fn heartbeat_at(&self, user_id: &str, display_name: &str, now: DateTime<Utc>) {
        // Threshold is irrelevant here because the transition result is dropped.
        self.mark_online_at(user_id, display_name, Duration::ZERO, now);
    }

    /// Opportunistic liveness bump from an authenticated write (message sent,
    /// location updated). Refreshes an existing record monotonically but never
    /// creates one: a record requires the display-name snapshot, which only
    /// the heartbeat/online-status/attribution entry points carry.
    pub fn touch_on_activity(&self, user_id: &str) {
        self.touch_on_activity_at(user_id, Utc::now());
    }

    pub fn touch_on_activity_at(&self, user_id: &str, now: DateTime<Utc>) {
        if let Some(mut record) = self.records.get_mut(user_id) {
            record.last_seen = record.last_seen.max(now);
        }
    }

    /// Attribute a transport connection to a user, creating the presence
    /// record if this is the first sign of life from them.
    pub fn attribute(&self, user_id: &str, display_name: &str, conn_id: ConnId) {
        let now = Utc::now();
        match self.records.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.last_seen = record.last_seen.max(now);
                record.connection_id = Some(conn_id);
            }
            Entry::Vacant(entry) => {
                entry.insert(PresenceRecord {
                    display_name: display_name.to_string(),
                    last_seen: now,
                    connection_id: Some(conn_id),
                });
            }
        }
        crate::metrics::set_presence_records(self.records.len() as i64);
    }

    /// Clear `conn_id` from whichever record still references it. The record
    /// itself survives: disconnect alone does not mean offline.
    pub fn clear_connection(&self, conn_id: ConnId) {
        for mut entry in self.records.iter_mut() {
            if entry.connection_id == Some(conn_id) {
                entry.connection_id = None;
            }
        }
    }

    /// Clear `conn_id` from one user's record, if that record references it.
    /// Used when a connection is re-attributed to a different user.
    pub fn clear_connection_of(&self, user_id: &str, conn_id: ConnId) {
        if let Some(mut record) = self.records.get_mut(user_id)
            && record.connection_id == Some(conn_id)
        {
            record.connection_id = None;
        }
    }

    /// Explicit removal (logout, or sweep-detected expiry handled by
    /// [`Self::snapshot`]). Idempotent; returns whether the user was present.
    pub fn mark_offline(&self, user_id: &str) -> bool {
        let was_present = self.records.remove(user_id).is_some();
        crate::metrics::set_presence_records(self.records.len() as i64);
        was_present
    }

    /// Whether the user currently counts as online.
    pub fn is_online(&self, user_id: &str, threshold: Duration) -> bool {
        let now = Utc::now();
        self.records
            .get(user_id)
            .is_some_and(|record| !is_stale(record.last_seen, now, threshold))
    }

    /// Point-in-time view of who is online, sweeping stale entries inline.
    ///
    /// Entries past the threshold are evicted and returned in
    /// [`Sweep::evicted`] so the caller can announce `user_offline` for each
    /// before returning its response.
    pub fn snapshot(&self, threshold: Duration) -> Sweep {
        self.snapshot_at(threshold, Utc::now())
    }

    pub fn snapshot_at(&self, threshold: Duration, now: DateTime<Utc>) -> Sweep {
        // Copy-then-iterate: the scan must not observe a torn view, and
        // mutation during the pass must not corrupt it.
        let copied: Vec<(String, String, DateTime<Utc>)> = self
            .records
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.display_name.clone(),
                    entry.last_seen,
                )
            })
            .collect();

        let mut sweep = Sweep::default();
        for (user_id, username, last_seen) in copied {
            if is_stale(last_seen, now, threshold) {
                // Re-check under the entry lock: a heartbeat racing the sweep
                // may have refreshed the record since the copy was taken.
                let removed = self
                    .records
                    .remove_if(&user_id, |_, record| {
                        is_stale(record.last_seen, now, threshold)
                    })
                    .is_some();
                if removed {
                    sweep.evicted.push(user_id);
                }
            } else {
                let minutes_ago = now.signed_duration_since(last_seen).num_minutes();
                sweep.online.push(OnlineUser {
                    user_id,
                    username,
                    last_seen: last_seen.to_rfc3339(),
                    minutes_ago,
                });
            }
        }

        if !sweep.evicted.is_empty() {
            crate::metrics::presence_evicted(sweep.evicted.len());
        }
        crate::metrics::set_presence_records(self.records.len() as i64);
        sweep
    }

    /// Join the full user directory with presence, grouping users by work
    /// status and annotating each with `is_online`, `last_seen`, and a
    /// human-readable `online_status`. Read-only: no eviction happens here.
    pub fn grouped_by_status(
        &self,
        members: Vec<DirectoryMember>,
        threshold: Duration,
    ) -> BTreeMap<String, Vec<serde_json::Value>> {
        self.grouped_by_status_at(members, threshold, Utc::now())
    }

    pub fn grouped_by_status_at(
        &self,
        members: Vec<DirectoryMember>,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, Vec<serde_json::Value>> {
        let mut grouped: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();

        for member in members {
            let (is_online, last_seen, label) = match self.records.get(&member.user_id) {
                Some(record) => {
                    let last_seen = record.last_seen;
                    if is_stale(last_seen, now, threshold) {
                        let minutes = now.signed_duration_since(last_seen).num_minutes();
                        (false, Some(last_seen.to_rfc3339()), format!("Vor {minutes} Min."))
                    } else {
                        (true, Some(last_seen.to_rfc3339()), "Online".to_string())
                    }
                }
                None => (false, None, "Offline".to_string()),
            };

            let mut details = member.details;
            if let Some(object) = details.as_object_mut() {
                object.insert("is_online".into(), serde_json::Value::Bool(is_online));
                object.insert(
                    "last_seen".into(),
                    last_seen.map_or(serde_json::Value::Null, serde_json::Value::String),
                );
                object.insert("online_status".into(), serde_json::Value::String(label));
            }

            grouped.entry(member.work_status).or_default().push(details);
        }

        grouped
    }

    /// Connection id currently recorded for a user, if any.
    pub fn connection_for(&self, user_id: &str) -> Option<ConnId> {
        self.records.get(user_id).and_then(|record| record.connection_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record (administrative reset).
    pub fn clear(&self) {
        self.records.clear();
        crate::metrics::set_presence_records(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use uuid::Uuid;

    const THRESHOLD: Duration = Duration::from_secs(120);

    #[test]
    fn first_mark_online_transitions() {
        let store = PresenceStore::new();
        assert!(store.mark_online("a", "Alice", THRESHOLD));
        // A refresh while still fresh is not a transition.
        assert!(!store.mark_online("a", "Alice", THRESHOLD));
    }

    #[test]
    fn stale_record_transitions_again() {
        let store = PresenceStore::new();
        let t0 = Utc::now();
        store.mark_online_at("a", "Alice", THRESHOLD, t0);

        let later = t0 + TimeDelta::seconds(121);
        assert!(store.mark_online_at("a", "Alice", THRESHOLD, later));
    }

    #[test]
    fn last_seen_is_monotonic() {
        let store = PresenceStore::new();
        let t0 = Utc::now();
        store.mark_online_at("a", "Alice", THRESHOLD, t0);

        // An out-of-order heartbeat must not regress last_seen.
        store.heartbeat_at("a", "Alice", t0 - TimeDelta::seconds(30));
        let sweep = store.snapshot_at(THRESHOLD, t0 + TimeDelta::seconds(1));
        assert_eq!(sweep.online.len(), 1);
        assert_eq!(sweep.online[0].last_seen, t0.to_rfc3339());
    }

    #[test]
    fn eviction_boundaries() {
        let store = PresenceStore::new();
        let now = Utc::now();
        store.heartbeat_at("fresh", "Fresh", now - TimeDelta::seconds(119));
        store.heartbeat_at("stale", "Stale", now - TimeDelta::seconds(121));

        let sweep = store.snapshot_at(THRESHOLD, now);
        assert_eq!(sweep.online.len(), 1);
        assert_eq!(sweep.online[0].user_id, "fresh");
        assert_eq!(sweep.evicted, vec!["stale".to_string()]);

        // The stale user is gone for good, not just filtered.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn logout_is_idempotent() {
        let store = PresenceStore::new();
        store.mark_online("a", "Alice", THRESHOLD);
        assert!(store.mark_offline("a"));
        assert!(!store.mark_offline("a"));
    }

    #[test]
    fn heartbeat_then_query_scenario() {
        let store = PresenceStore::new();
        let t0 = Utc::now();
        store.heartbeat_at("a", "Alice", t0);

        // Queried at t=90s with a 120s threshold: online, one minute ago.
        let sweep = store.snapshot_at(THRESHOLD, t0 + TimeDelta::seconds(90));
        assert_eq!(sweep.online.len(), 1);
        assert_eq!(sweep.online[0].minutes_ago, 1);
        assert!(sweep.evicted.is_empty());

        // Queried at t=150s: absent, evicted during this query.
        let sweep = store.snapshot_at(THRESHOLD, t0 + TimeDelta::seconds(150));
        assert!(sweep.online.is_empty());
        assert_eq!(sweep.evicted, vec!["a".to_string()]);
    }

    #[test]
    fn touch_on_activity_never_creates() {
        let store = PresenceStore::new();
        store.touch_on_activity("ghost");
        assert!(store.is_empty());

        let t0 = Utc::now();
        store.heartbeat_at("a", "Alice", t0);
        store.touch_on_activity_at("a", t0 + TimeDelta::seconds(60));
        let sweep = store.snapshot_at(THRESHOLD, t0 + TimeDelta::seconds(150));
        assert_eq!(sweep.online.len(), 1, "activity must keep the user alive");
    }

    #[test]
    fn display_name_is_a_snapshot() {
        let store = PresenceStore::new();
        store.mark_online("a", "Alice", THRESHOLD);
        store.heartbeat("a", "Alicia");

        let sweep = store.snapshot(THRESHOLD);
        assert_eq!(sweep.online[0].username, "Alice");
    }

    #[test]
    fn attribution_sets_and_clear_removes_connection() {
        let store = PresenceStore::new();
        let conn = Uuid::new_v4();

        store.attribute("a", "Alice", conn);
        assert_eq!(store.connection_for("a"), Some(conn));

        // Clearing an unrelated connection leaves the record alone.
        store.clear_connection(Uuid::new_v4());
        assert_eq!(store.connection_for("a"), Some(conn));

        store.clear_connection(conn);
        assert_eq!(store.connection_for("a"), None);
        // Disconnect alone never removes presence.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn grouped_by_status_labels() {
        let store = PresenceStore::new();
        let now = Utc::now();
        store.heartbeat_at("online", "On", now - TimeDelta::seconds(10));
        store.heartbeat_at("away", "Away", now - TimeDelta::seconds(300));

        let members = vec![
            DirectoryMember {
                user_id: "online".into(),
                work_status: "Im Dienst".into(),
                details: serde_json::json!({"id": "online"}),
            },
            DirectoryMember {
                user_id: "away".into(),
                work_status: "Im Dienst".into(),
                details: serde_json::json!({"id": "away"}),
            },
            DirectoryMember {
                user_id: "never-seen".into(),
                work_status: "Pause".into(),
                details: serde_json::json!({"id": "never-seen"}),
            },
        ];

        let grouped = store.grouped_by_status_at(members, THRESHOLD, now);
        let on_duty = &grouped["Im Dienst"];
        assert_eq!(on_duty[0]["online_status"], "Online");
        assert_eq!(on_duty[0]["is_online"], true);
        assert_eq!(on_duty[1]["online_status"], "Vor 5 Min.");
        assert_eq!(on_duty[1]["is_online"], false);
        assert_eq!(grouped["Pause"][0]["online_status"], "Offline");
        assert_eq!(grouped["Pause"][0]["last_seen"], serde_json::Value::Null);

        // grouped_by_status never evicts.
        assert_eq!(store.len(), 2);
    }
}
