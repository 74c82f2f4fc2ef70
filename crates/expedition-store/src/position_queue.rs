//! Offline outbox for GPS position samples.
//!
//! Every sample the tracker takes is written here with `synced = 0`,
//! whether or not the channel is up. A row is flipped to `synced = 1` only
//! after the corresponding wire event has been published successfully, and
//! rows are never deleted before that confirmation. Replay is at-least-once:
//! the server may see duplicates, never gaps.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use expedition_types::{ExpeditionId, GpsPoint};

use crate::error::StoreError;

/// A queued position record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedPosition {
    /// Row identifier, monotonically increasing in insertion order.
    pub id: i64,
    /// The expedition the sample belongs to.
    pub expedition_id: ExpeditionId,
    /// When the sample was recorded locally.
    pub recorded_at: DateTime<Utc>,
    /// The sample itself.
    pub point: GpsPoint,
    /// Whether the record has been confirmed delivered to the channel.
    pub synced: bool,
}

/// Raw row shape before the JSON point column is decoded.
#[derive(Debug, sqlx::FromRow)]
struct QueuedPositionRow {
    id: i64,
    expedition_id: String,
    recorded_at: DateTime<Utc>,
    point: String,
    synced: bool,
}

impl QueuedPositionRow {
    fn decode(self) -> Result<QueuedPosition, StoreError> {
        let expedition_id = Uuid::parse_str(&self.expedition_id)
            .map(ExpeditionId::from)
            .map_err(|e| StoreError::Config(format!("invalid expedition id in row: {e}")))?;
        let point: GpsPoint = serde_json::from_str(&self.point)?;
        Ok(QueuedPosition {
            id: self.id,
            expedition_id,
            recorded_at: self.recorded_at,
            point,
            synced: self.synced,
        })
    }
}

/// Operations on the `queued_positions` table.
pub struct PositionQueue<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PositionQueue<'a> {
    /// Create a new position queue bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a sample to the queue with `synced = 0`.
    ///
    /// Returns the row id of the new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the point cannot be encoded.
    /// Returns [`StoreError::Sqlite`] if the insert fails.
    pub async fn enqueue(
        &self,
        expedition_id: ExpeditionId,
        point: &GpsPoint,
    ) -> Result<i64, StoreError> {
        let encoded = serde_json::to_string(point)?;
        let result = sqlx::query(
            r"INSERT INTO queued_positions (expedition_id, recorded_at, point, synced)
              VALUES ($1, $2, $3, 0)",
        )
        .bind(expedition_id.to_string())
        .bind(point.timestamp)
        .bind(encoded)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All unsynced records for an expedition, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn unsynced(
        &self,
        expedition_id: ExpeditionId,
    ) -> Result<Vec<QueuedPosition>, StoreError> {
        let rows: Vec<QueuedPositionRow> = sqlx::query_as(
            r"SELECT id, expedition_id, recorded_at, point, synced
              FROM queued_positions
              WHERE expedition_id = $1 AND synced = 0
              ORDER BY id ASC",
        )
        .bind(expedition_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(QueuedPositionRow::decode).collect()
    }

    /// Number of unsynced records for an expedition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn unsynced_count(&self, expedition_id: ExpeditionId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM queued_positions
              WHERE expedition_id = $1 AND synced = 0",
        )
        .bind(expedition_id.to_string())
        .fetch_one(self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Mark a record as confirmed delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has the given id.
    /// Returns [`StoreError::Sqlite`] if the update fails.
    pub async fn mark_synced(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(r"UPDATE queued_positions SET synced = 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("queued position {id}")));
        }
        Ok(())
    }

    /// Delete records that have been confirmed delivered.
    ///
    /// Only ever touches `synced = 1` rows; unsynced telemetry survives
    /// until replayed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails.
    pub async fn purge_synced(&self, expedition_id: ExpeditionId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"DELETE FROM queued_positions WHERE expedition_id = $1 AND synced = 1",
        )
        .bind(expedition_id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
