//! Cached expedition aggregate snapshots.
//!
//! The remote service owns the [`Expedition`] aggregate; the client keeps
//! the last pushed copy here so a dashboard can render route, roster, and
//! weather through an outage. One row per expedition, overwritten on every
//! push.

use chrono::Utc;
use sqlx::SqlitePool;

use expedition_types::{Expedition, ExpeditionId};

use crate::error::StoreError;

/// Operations on the `expedition_snapshots` table.
pub struct SnapshotStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new snapshot store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the cached snapshot for an expedition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the aggregate cannot be
    /// encoded. Returns [`StoreError::Sqlite`] if the upsert fails.
    pub async fn put(&self, expedition: &Expedition) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(expedition)?;
        sqlx::query(
            r"INSERT INTO expedition_snapshots (expedition_id, snapshot, updated_at)
              VALUES ($1, $2, $3)
              ON CONFLICT (expedition_id) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(expedition.id.to_string())
        .bind(encoded)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        tracing::debug!(expedition_id = %expedition.id, "Cached expedition snapshot");
        Ok(())
    }

    /// Load the cached snapshot for an expedition, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the stored JSON is
    /// malformed. Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn get(
        &self,
        expedition_id: ExpeditionId,
    ) -> Result<Option<Expedition>, StoreError> {
        let row: Option<String> = sqlx::query_scalar(
            r"SELECT snapshot FROM expedition_snapshots WHERE expedition_id = $1",
        )
        .bind(expedition_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }
}
