//! Row types shared between the repositories, the API layer, and event
//! payloads. Timestamps are unix seconds (UTC) throughout.

use serde::{Deserialize, Serialize};

/// User roles, in decreasing order of privilege.
pub mod role {
    pub const ADMIN: &str = "admin";
    pub const POLICE: &str = "police";
    pub const COMMUNITY: &str = "community";
    pub const TRAINEE: &str = "trainee";
}

/// Default work status for new users.
pub const DEFAULT_WORK_STATUS: &str = "Im Dienst";

/// A user account.
///
/// `password_hash` never leaves the server: it is skipped on serialization.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub badge_number: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub service_number: Option<String>,
    pub rank: Option<String>,
    /// Work status ("Im Dienst", "Pause", "Einsatz", "Streife", ...).
    pub status: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == role::ADMIN
    }

    /// Police and admin may manage incidents.
    pub fn can_manage_incidents(&self) -> bool {
        self.role == role::ADMIN || self.role == role::POLICE
    }
}

/// A geographic point (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// An incident report.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    /// "high", "medium", or "low".
    pub priority: String,
    /// "open", "in_progress", or "closed".
    pub status: String,
    pub location: GeoPoint,
    pub address: String,
    pub reported_by: String,
    pub assigned_to: Option<String>,
    pub assigned_to_name: Option<String>,
    /// Base64-encoded attachments.
    pub images: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A channel message.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub recipient_id: Option<String>,
    pub channel: String,
    pub message_type: String,
    pub timestamp: i64,
}

/// One entry in a report's edit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEntry {
    pub edited_by: String,
    pub edited_by_name: String,
    pub edited_at: i64,
    /// Field name -> (old, new).
    pub changes: std::collections::BTreeMap<String, (Option<String>, String)>,
}

/// A shift report or incident archive.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub shift_date: String,
    /// "draft", "submitted", "reviewed", or "archived".
    pub status: String,
    /// Set when this report archives a completed incident.
    pub incident_id: Option<String>,
    pub last_edited_by: Option<String>,
    pub last_edited_by_name: Option<String>,
    pub edit_history: Vec<EditEntry>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored location ping.
#[derive(Debug, Clone, Serialize)]
pub struct LocationPing {
    pub user_id: String,
    pub location: GeoPoint,
    pub timestamp: i64,
}
