//! Message repository for database queries.

use super::DbError;
use super::models::Message;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fields accepted when storing a message.
pub struct NewMessage<'a> {
    pub content: &'a str,
    pub sender_id: &'a str,
    pub sender_name: &'a str,
    pub recipient_id: Option<&'a str>,
    pub channel: &'a str,
    pub message_type: &'a str,
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewMessage<'_>) -> Result<Message, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO messages
                (id, content, sender_id, sender_name, recipient_id, channel, message_type, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.content)
        .bind(new.sender_id)
        .bind(new.sender_name)
        .bind(new.recipient_id)
        .bind(new.channel)
        .bind(new.message_type)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DbError::Internal("message vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Message>, DbError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(message)
    }

    /// Latest messages for a channel, newest first.
    pub async fn list_for_channel(
        &self,
        channel: &str,
        limit: i64,
    ) -> Result<Vec<Message>, DbError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(channel)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(messages)
    }

    /// Delete a message; returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
