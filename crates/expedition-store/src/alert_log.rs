//! Append-only local log of emergency alerts.
//!
//! Every alert raised by this client is written here before any delivery
//! attempt, whatever the connection state. Alerts are write-once: the log
//! supports insert and read, never update or delete.

use sqlx::SqlitePool;

use expedition_types::{EmergencyAlert, ExpeditionId};

use crate::error::StoreError;

/// Operations on the `emergency_alerts` table.
pub struct AlertLog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertLog<'a> {
    /// Create a new alert log bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a local copy of an alert.
    ///
    /// Inserting the same alert id twice is a no-op rather than an error,
    /// so a retried caller cannot fail the emergency path on a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the alert cannot be
    /// encoded. Returns [`StoreError::Sqlite`] if the insert fails.
    pub async fn record(&self, alert: &EmergencyAlert) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(alert)?;
        sqlx::query(
            r"INSERT INTO emergency_alerts (id, expedition_id, raised_at, alert)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(alert.id.to_string())
        .bind(alert.expedition_id.to_string())
        .bind(alert.raised_at)
        .bind(encoded)
        .execute(self.pool)
        .await?;

        tracing::debug!(alert_id = %alert.id, kind = ?alert.kind, "Recorded emergency alert");
        Ok(())
    }

    /// The most recent `limit` alerts for an expedition, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if a stored alert is
    /// malformed. Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn recent(
        &self,
        expedition_id: ExpeditionId,
        limit: u32,
    ) -> Result<Vec<EmergencyAlert>, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(
            r"SELECT alert FROM emergency_alerts
              WHERE expedition_id = $1
              ORDER BY raised_at DESC, rowid DESC
              LIMIT $2",
        )
        .bind(expedition_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    /// Total number of alerts recorded for an expedition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn count(&self, expedition_id: ExpeditionId) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar(r"SELECT COUNT(*) FROM emergency_alerts WHERE expedition_id = $1")
                .bind(expedition_id.to_string())
                .fetch_one(self.pool)
                .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
