//! Local durable storage for the Expedition Tracker.
//!
//! Field devices lose connectivity constantly, so everything the tracker
//! would send upstream is first written to an embedded `SQLite` database
//! and replayed after reconnect. The store also caches the last pushed
//! expedition aggregate so dashboards keep working offline.
//!
//! # Architecture
//!
//! ```text
//! Sampling / health / alerts
//!     |
//!     +-- Always write first ----> SQLite (StorePool)
//!     |       |-- PositionQueue   (outbox, synced flag)
//!     |       |-- HealthQueue     (outbox, synced flag)
//!     |       +-- AlertLog        (append-only local copies)
//!     |
//!     +-- Server pushes ---------> SnapshotStore (cached aggregate)
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- Connection pool and schema management
//! - [`position_queue`] -- Offline outbox for GPS samples
//! - [`health_queue`] -- Offline outbox for health readings
//! - [`snapshot_store`] -- Cached expedition aggregate per expedition
//! - [`alert_log`] -- Append-only emergency alert copies
//! - [`error`] -- Shared error types

pub mod alert_log;
pub mod error;
pub mod health_queue;
pub mod position_queue;
pub mod snapshot_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use alert_log::AlertLog;
pub use error::StoreError;
pub use health_queue::{HealthQueue, QueuedHealth};
pub use position_queue::{PositionQueue, QueuedPosition};
pub use snapshot_store::SnapshotStore;
pub use sqlite::StorePool;
