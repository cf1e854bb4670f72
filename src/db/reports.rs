//! Report repository for database queries.

use super::DbError;
use super::models::{EditEntry, Report};
use sqlx::SqlitePool;
use uuid::Uuid;

type ReportRow = (
    String,         // id
    String,         // title
    String,         // content
    String,         // author_id
    String,         // author_name
    String,         // shift_date
    String,         // status
    Option<String>, // incident_id
    Option<String>, // last_edited_by
    Option<String>, // last_edited_by_name
    String,         // edit_history (JSON)
    i64,            // created_at
    i64,            // updated_at
);

const REPORT_COLUMNS: &str = "id, title, content, author_id, author_name, shift_date, status, \
     incident_id, last_edited_by, last_edited_by_name, edit_history, created_at, updated_at";

fn from_row(row: ReportRow) -> Report {
    let (
        id,
        title,
        content,
        author_id,
        author_name,
        shift_date,
        status,
        incident_id,
        last_edited_by,
        last_edited_by_name,
        edit_history,
        created_at,
        updated_at,
    ) = row;

    Report {
        id,
        title,
        content,
        author_id,
        author_name,
        shift_date,
        status,
        incident_id,
        last_edited_by,
        last_edited_by_name,
        edit_history: serde_json::from_str(&edit_history).unwrap_or_default(),
        created_at,
        updated_at,
    }
}

/// Fields accepted when creating a report.
pub struct NewReport<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub author_id: &'a str,
    pub author_name: &'a str,
    pub shift_date: &'a str,
    pub status: &'a str,
    /// Set when this report archives a completed incident.
    pub incident_id: Option<&'a str>,
}

/// Repository for report operations.
pub struct ReportRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReportRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewReport<'_>) -> Result<Report, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO reports
                (id, title, content, author_id, author_name, shift_date, status,
                 incident_id, edit_history, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.title)
        .bind(new.content)
        .bind(new.author_id)
        .bind(new.author_name)
        .bind(new.shift_date)
        .bind(new.status)
        .bind(new.incident_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DbError::Internal("report vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Report>, DbError> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    /// All reports, newest first.
    pub async fn list_all(&self) -> Result<Vec<Report>, DbError> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Reports by one author, newest first.
    pub async fn list_by_author(&self, author_id: &str) -> Result<Vec<Report>, DbError> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE author_id = ? ORDER BY created_at DESC"
        ))
        .bind(author_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Overwrite title/content/shift_date, recording the edit in the history.
    /// Returns the updated report, or `None` if absent.
    pub async fn update_content(
        &self,
        id: &str,
        title: &str,
        content: &str,
        shift_date: &str,
        edit: EditEntry,
    ) -> Result<Option<Report>, DbError> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut history = existing.edit_history;
        history.push(edit.clone());
        let history_json = serde_json::to_string(&history)
            .map_err(|e| DbError::Internal(format!("encoding edit history: {e}")))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE reports SET
                title               = ?,
                content             = ?,
                shift_date          = ?,
                last_edited_by      = ?,
                last_edited_by_name = ?,
                edit_history        = ?,
                updated_at          = ?
            WHERE id = ?
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(shift_date)
        .bind(&edit.edited_by)
        .bind(&edit.edited_by_name)
        .bind(&history_json)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find_by_id(id).await
    }
}
