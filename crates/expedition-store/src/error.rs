//! Error types for the local storage layer.
//!
//! All errors are propagated via [`StoreError`], which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.
//! Callers in the tracker treat storage as best-effort: failures are logged
//! as warnings and never escalated past the storage boundary.

/// Errors that can occur in the local storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A serialization or deserialization error on a JSON column.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A configuration error (bad database path or URL).
    #[error("Configuration error: {0}")]
    Config(String),
}
