//! `SQLite` connection pool and schema management.
//!
//! The tracker runs on field devices, so durability lives in an embedded
//! `SQLite` file rather than a remote service. Uses [`sqlx`] with runtime
//! query construction (not compile-time checked) to avoid requiring a live
//! database at build time. All queries are parameterized.
//!
//! # Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `queued_positions` | Offline outbox of GPS samples with a `synced` flag |
//! | `queued_health` | Offline outbox of health readings with a `synced` flag |
//! | `expedition_snapshots` | Last cached expedition aggregate per expedition |
//! | `emergency_alerts` | Append-only local copies of raised alerts |

use std::path::Path;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StoreError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection acquire timeout in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Idempotent schema definition executed by [`StorePool::run_migrations`].
const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS queued_positions (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        expedition_id TEXT    NOT NULL,
        recorded_at   TEXT    NOT NULL,
        point         TEXT    NOT NULL,
        synced        INTEGER NOT NULL DEFAULT 0
    )",
    r"CREATE INDEX IF NOT EXISTS idx_queued_positions_pending
        ON queued_positions (expedition_id, synced, id)",
    r"CREATE TABLE IF NOT EXISTS queued_health (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        expedition_id  TEXT    NOT NULL,
        participant_id TEXT    NOT NULL,
        recorded_at    TEXT    NOT NULL,
        metrics        TEXT    NOT NULL,
        synced         INTEGER NOT NULL DEFAULT 0
    )",
    r"CREATE INDEX IF NOT EXISTS idx_queued_health_pending
        ON queued_health (expedition_id, synced, id)",
    r"CREATE TABLE IF NOT EXISTS expedition_snapshots (
        expedition_id TEXT PRIMARY KEY,
        snapshot      TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS emergency_alerts (
        id            TEXT PRIMARY KEY,
        expedition_id TEXT NOT NULL,
        raised_at     TEXT NOT NULL,
        alert         TEXT NOT NULL
    )",
];

/// Connection pool handle to the local `SQLite` database.
///
/// Wraps a [`sqlx::SqlitePool`] and provides access to the position queue,
/// health queue, snapshot store, and alert log.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: SqlitePool,
}

impl StorePool {
    /// Open (creating if missing) the database file at `path`.
    ///
    /// The database runs in WAL mode so telemetry writes never block
    /// concurrent reads from a dashboard process.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the pool cannot be opened.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.as_ref().display(), "Opened expedition store");
        Ok(Self { pool })
    }

    /// Open an in-memory database.
    ///
    /// Restricted to a single connection: each `SQLite` memory connection
    /// is its own database, so a larger pool would shard the data.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the pool cannot be opened.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Create all tables and indexes if they do not already exist.
    ///
    /// Safe to call on every startup; the DDL is idempotent. There is no
    /// schema versioning -- the original system had none either, and the
    /// tables only ever gain columns through new deployments wiping the
    /// device store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if any DDL statement fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Expedition store schema ready");
        Ok(())
    }

    /// Access the underlying [`SqlitePool`].
    pub const fn inner(&self) -> &SqlitePool {
        &self.pool
    }
}
