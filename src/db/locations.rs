//! Location repository for database queries.

use super::DbError;
use super::models::{GeoPoint, LocationPing};
use sqlx::SqlitePool;

/// Repository for location pings.
pub struct LocationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LocationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one ping. History is append-only; reads pick the latest per user.
    pub async fn record(&self, ping: &LocationPing) -> Result<(), DbError> {
        sqlx::query("INSERT INTO locations (user_id, lat, lng, timestamp) VALUES (?, ?, ?, ?)")
            .bind(&ping.user_id)
            .bind(ping.location.lat)
            .bind(ping.location.lng)
            .bind(ping.timestamp)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Latest ping per user since `cutoff` (unix seconds).
    pub async fn latest_since(&self, cutoff: i64) -> Result<Vec<LocationPing>, DbError> {
        let rows = sqlx::query_as::<_, (String, f64, f64, i64)>(
            r#"
            SELECT user_id, lat, lng, MAX(timestamp) AS timestamp
            FROM locations
            WHERE timestamp >= ?
            GROUP BY user_id
            ORDER BY timestamp DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, lat, lng, timestamp)| LocationPing {
                user_id,
                location: GeoPoint { lat, lng },
                timestamp,
            })
            .collect())
    }
}
