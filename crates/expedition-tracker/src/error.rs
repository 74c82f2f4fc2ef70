//! Error types for the tracking client.
//!
//! [`TrackerError`] is the only error type that crosses the public API
//! boundary. Channel failures below it are retried internally; location
//! errors pass through untouched so the caller of `start_tracking` owns
//! display and recovery.

use crate::channel::ChannelError;
use crate::location::LocationError;
use expedition_store::StoreError;

/// Errors surfaced by [`crate::tracker::ExpeditionTracker`] operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The event channel rejected or failed an operation.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The location source refused to start a watch.
    #[error("location error: {0}")]
    Location(#[from] LocationError),

    /// The local store failed an operation the caller asked for directly.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An operation that requires a live channel ran while disconnected.
    #[error("not connected to the event channel")]
    NotConnected,
}
