//! Offline outbox for health sensor readings.
//!
//! Same at-least-once shape as the position queue. The original design
//! silently dropped health updates while disconnected; here they share the
//! positions' durability rule so a reading taken in a dead zone still
//! reaches the service after reconnect.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use expedition_types::{ExpeditionId, HealthMetrics, ParticipantId};

use crate::error::StoreError;

/// A queued health record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedHealth {
    /// Row identifier, monotonically increasing in insertion order.
    pub id: i64,
    /// The expedition the reading belongs to.
    pub expedition_id: ExpeditionId,
    /// The participant the reading belongs to.
    pub participant_id: ParticipantId,
    /// When the reading was recorded locally.
    pub recorded_at: DateTime<Utc>,
    /// The readings themselves.
    pub metrics: HealthMetrics,
    /// Whether the record has been confirmed delivered to the channel.
    pub synced: bool,
}

/// Raw row shape before the JSON metrics column is decoded.
#[derive(Debug, sqlx::FromRow)]
struct QueuedHealthRow {
    id: i64,
    expedition_id: String,
    participant_id: String,
    recorded_at: DateTime<Utc>,
    metrics: String,
    synced: bool,
}

impl QueuedHealthRow {
    fn decode(self) -> Result<QueuedHealth, StoreError> {
        let expedition_id = Uuid::parse_str(&self.expedition_id)
            .map(ExpeditionId::from)
            .map_err(|e| StoreError::Config(format!("invalid expedition id in row: {e}")))?;
        let participant_id = Uuid::parse_str(&self.participant_id)
            .map(ParticipantId::from)
            .map_err(|e| StoreError::Config(format!("invalid participant id in row: {e}")))?;
        let metrics: HealthMetrics = serde_json::from_str(&self.metrics)?;
        Ok(QueuedHealth {
            id: self.id,
            expedition_id,
            participant_id,
            recorded_at: self.recorded_at,
            metrics,
            synced: self.synced,
        })
    }
}

/// Operations on the `queued_health` table.
pub struct HealthQueue<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HealthQueue<'a> {
    /// Create a new health queue bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a reading to the queue with `synced = 0`.
    ///
    /// Returns the row id of the new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the metrics cannot be
    /// encoded. Returns [`StoreError::Sqlite`] if the insert fails.
    pub async fn enqueue(
        &self,
        expedition_id: ExpeditionId,
        participant_id: ParticipantId,
        metrics: &HealthMetrics,
    ) -> Result<i64, StoreError> {
        let encoded = serde_json::to_string(metrics)?;
        let result = sqlx::query(
            r"INSERT INTO queued_health
              (expedition_id, participant_id, recorded_at, metrics, synced)
              VALUES ($1, $2, $3, $4, 0)",
        )
        .bind(expedition_id.to_string())
        .bind(participant_id.to_string())
        .bind(metrics.recorded_at)
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
    ) -> Result<Vec<QueuedHealth>, StoreError> {
        let rows: Vec<QueuedHealthRow> = sqlx::query_as(
            r"SELECT id, expedition_id, participant_id, recorded_at, metrics, synced
              FROM queued_health
              WHERE expedition_id = $1 AND synced = 0
              ORDER BY id ASC",
        )
        .bind(expedition_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(QueuedHealthRow::decode).collect()
    }

    /// Number of unsynced records for an expedition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn unsynced_count(&self, expedition_id: ExpeditionId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM queued_health
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
        let result = sqlx::query(r"UPDATE queued_health SET synced = 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("queued health reading {id}")));
        }
        Ok(())
    }

    /// Delete records that have been confirmed delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails.
    pub async fn purge_synced(&self, expedition_id: ExpeditionId) -> Result<u64, StoreError> {
        let result =
            sqlx::query(r"DELETE FROM queued_health WHERE expedition_id = $1 AND synced = 1")
                .bind(expedition_id.to_string())
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
