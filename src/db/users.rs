//! User repository for database queries.

use super::DbError;
use super::models::{DEFAULT_WORK_STATUS, User};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fields accepted when creating a user.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub badge_number: Option<&'a str>,
    pub department: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub service_number: Option<&'a str>,
    pub rank: Option<&'a str>,
}

/// Mutable profile fields. `None` leaves the stored value unchanged.
#[derive(Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub service_number: Option<String>,
    pub rank: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Fails with [`DbError::EmailExists`] on a duplicate email.
    pub async fn create(&self, new: NewUser<'_>) -> Result<User, DbError> {
        if self.find_by_email(new.email).await?.is_some() {
            return Err(DbError::EmailExists(new.email.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, username, password_hash, role, badge_number, department,
                 phone, service_number, rank, status, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.email)
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.badge_number)
        .bind(new.department)
        .bind(new.phone)
        .bind(new.service_number)
        .bind(new.rank)
        .bind(DEFAULT_WORK_STATUS)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DbError::Internal("user vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Full directory, active users first, then by username.
    pub async fn list_all(&self) -> Result<Vec<User>, DbError> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY is_active DESC, username")
                .fetch_all(self.pool)
                .await?;
        Ok(users)
    }

    /// Active users only (the directory joined against presence).
    pub async fn list_active(&self) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE is_active = 1 ORDER BY username",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }

    /// Apply a partial profile update; returns the updated user, or `None` if absent.
    pub async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<User>, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                username       = COALESCE(?, username),
                phone          = COALESCE(?, phone),
                service_number = COALESCE(?, service_number),
                rank           = COALESCE(?, rank),
                department     = COALESCE(?, department),
                status         = COALESCE(?, status),
                updated_at     = ?
            WHERE id = ?
            "#,
        )
        .bind(update.username)
        .bind(update.phone)
        .bind(update.service_number)
        .bind(update.rank)
        .bind(update.department)
        .bind(update.status)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Delete a user; returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
