//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - User accounts and profiles
//! - Incidents and their lifecycle
//! - Channel messages
//! - Shift reports and incident archives
//! - Location pings
//!
//! Presence is deliberately NOT stored here: the in-memory registries in
//! [`crate::state`] own it and do not survive restarts.

pub mod incidents;
pub mod locations;
pub mod messages;
pub mod models;
pub mod reports;
pub mod users;

pub use incidents::IncidentRepository;
pub use locations::LocationRepository;
pub use messages::MessageRepository;
pub use reports::ReportRepository;
pub use users::UserRepository;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("email already registered: {0}")]
    EmailExists(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `path` and bring the schema up to
    /// date. `:memory:` yields a private throwaway store.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let in_memory = path == ":memory:";

        let options = if in_memory {
            // A named shared-cache URI, fresh per call: plain ":memory:"
            // would hand every pooled connection its own empty database, and
            // reusing one name would bleed state between parallel tests.
            SqliteConnectOptions::new()
                .filename(format!("file:memdb-{}?mode=memory&cache=shared", Uuid::new_v4()))
                .shared_cache(true)
                .create_if_missing(true)
        } else {
            // SQLite creates files but not directories.
            if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(dir);
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                // Readers must not block behind a writer.
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let options = options.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            // Shared-cache memory databases tolerate exactly one connection
            // without "table is locked" surprises.
            .max_connections(if in_memory { 1 } else { 5 })
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::Migration)?;

        info!(path = %path, "Database ready");

        Ok(Self { pool })
    }

    /// Get user repository.
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    /// Get incident repository.
    pub fn incidents(&self) -> IncidentRepository<'_> {
        IncidentRepository::new(&self.pool)
    }

    /// Get message repository.
    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.pool)
    }

    /// Get report repository.
    pub fn reports(&self) -> ReportRepository<'_> {
        ReportRepository::new(&self.pool)
    }

    /// Get location repository.
    pub fn locations(&self) -> LocationRepository<'_> {
        LocationRepository::new(&self.pool)
    }

    /// Delete every row from every table. Used by the administrative reset.
    pub async fn wipe_all(&self) -> Result<u64, DbError> {
        let mut deleted = 0;
        for table in ["locations", "messages", "reports", "incidents", "users"] {
            let result = sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::NewUser;

    #[tokio::test]
    async fn on_disk_database_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();

        let user = db
            .users()
            .create(NewUser {
                email: "anna@kiezwache.berlin",
                username: "Anna",
                password_hash: "$argon2id$fake",
                role: "police",
                badge_number: Some("B-12"),
                department: None,
                phone: None,
                service_number: None,
                rank: None,
            })
            .await
            .unwrap();

        let loaded = db.users().find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.username, "Anna");
        assert_eq!(loaded.badge_number.as_deref(), Some("B-12"));
        assert!(loaded.is_active);

        // Duplicate email is rejected, case-insensitively.
        let duplicate = db
            .users()
            .create(NewUser {
                email: "ANNA@kiezwache.berlin",
                username: "Clone",
                password_hash: "$argon2id$fake",
                role: "police",
                badge_number: None,
                department: None,
                phone: None,
                service_number: None,
                rank: None,
            })
            .await;
        assert!(matches!(duplicate, Err(DbError::EmailExists(_))));
    }

    #[tokio::test]
    async fn wipe_all_empties_every_table() {
        let db = Database::new(":memory:").await.unwrap();
        db.users()
            .create(NewUser {
                email: "anna@kiezwache.berlin",
                username: "Anna",
                password_hash: "$argon2id$fake",
                role: "police",
                badge_number: None,
                department: None,
                phone: None,
                service_number: None,
                rank: None,
            })
            .await
            .unwrap();
        assert_eq!(db.users().count().await.unwrap(), 1);

        let deleted = db.wipe_all().await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.users().count().await.unwrap(), 0);
    }
}
