//! Incident repository for database queries.

use super::DbError;
use super::models::{GeoPoint, Incident};
use sqlx::SqlitePool;
use uuid::Uuid;

type IncidentRow = (
    String,         // id
    String,         // title
    String,         // description
    String,         // priority
    String,         // status
    f64,            // lat
    f64,            // lng
    String,         // address
    String,         // reported_by
    Option<String>, // assigned_to
    Option<String>, // assigned_to_name
    String,         // images (JSON)
    i64,            // created_at
    i64,            // updated_at
);

const INCIDENT_COLUMNS: &str = "id, title, description, priority, status, lat, lng, address, \
     reported_by, assigned_to, assigned_to_name, images, created_at, updated_at";

fn from_row(row: IncidentRow) -> Incident {
    let (
        id,
        title,
        description,
        priority,
        status,
        lat,
        lng,
        address,
        reported_by,
        assigned_to,
        assigned_to_name,
        images,
        created_at,
        updated_at,
    ) = row;

    Incident {
        id,
        title,
        description,
        priority,
        status,
        location: GeoPoint { lat, lng },
        address,
        reported_by,
        assigned_to,
        assigned_to_name,
        images: serde_json::from_str(&images).unwrap_or_default(),
        created_at,
        updated_at,
    }
}

/// Fields accepted when filing an incident.
pub struct NewIncident<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub priority: &'a str,
    pub location: GeoPoint,
    pub address: &'a str,
    pub reported_by: &'a str,
    pub images: &'a [String],
}

/// Mutable incident fields. `None` leaves the stored value unchanged.
#[derive(Default)]
pub struct IncidentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
}

/// Repository for incident operations.
pub struct IncidentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> IncidentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewIncident<'_>) -> Result<Incident, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let images = serde_json::to_string(new.images)
            .map_err(|e| DbError::Internal(format!("encoding images: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO incidents
                (id, title, description, priority, status, lat, lng, address,
                 reported_by, images, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.title)
        .bind(new.description)
        .bind(new.priority)
        .bind(new.location.lat)
        .bind(new.location.lng)
        .bind(new.address)
        .bind(new.reported_by)
        .bind(&images)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DbError::Internal("incident vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, DbError> {
        let row = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    /// All incidents, newest first.
    pub async fn list_all(&self) -> Result<Vec<Incident>, DbError> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Apply a partial update; returns the updated incident, or `None` if absent.
    pub async fn update(
        &self,
        id: &str,
        update: IncidentUpdate,
    ) -> Result<Option<Incident>, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE incidents SET
                title       = COALESCE(?, title),
                description = COALESCE(?, description),
                priority    = COALESCE(?, priority),
                status      = COALESCE(?, status),
                address     = COALESCE(?, address),
                updated_at  = ?
            WHERE id = ?
            "#,
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.priority)
        .bind(update.status)
        .bind(update.address)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Assign the incident and move it to `in_progress`; returns the updated
    /// incident, or `None` if absent.
    pub async fn assign(
        &self,
        id: &str,
        assignee_id: &str,
        assignee_name: &str,
    ) -> Result<Option<Incident>, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE incidents SET
                assigned_to      = ?,
                assigned_to_name = ?,
                status           = 'in_progress',
                updated_at       = ?
            WHERE id = ?
            "#,
        )
        .bind(assignee_id)
        .bind(assignee_name)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Delete an incident; returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_open(&self) -> Result<i64, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM incidents WHERE status = 'open'")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
