//! Real-time expedition tracking client.
//!
//! Bridges three worlds: the device's continuous location stream, a
//! remote real-time event channel, and local subscribers. Samples are
//! buffered in a capped in-memory track, written to a durable offline
//! queue, and published live when the channel is up; the channel
//! reconnects with capped exponential backoff and gives up silently after
//! exhausting its failure budget.
//!
//! # Architecture
//!
//! ```text
//! LocationSource --> sampling task --> TrackBuffer (capped window)
//!                        |        \--> EventBus (local subscribers)
//!                        |         \-> PositionQueue (offline outbox)
//!                        v
//!                  ChannelTransport <-- connection supervisor (backoff)
//!                        ^
//!                  server pushes --> SnapshotStore cache + EventBus
//! ```
//!
//! # Modules
//!
//! - [`tracker`] -- The [`tracker::ExpeditionTracker`] orchestrator
//! - [`track`] -- Capped in-memory GPS track buffer
//! - [`location`] -- Location source trait, watch options, watch errors
//! - [`simulated`] -- Random-walk location source
//! - [`replay`] -- Recorded-track location source
//! - [`channel`] -- Event channel trait, NATS and in-memory transports
//! - [`bus`] -- Multi-subscriber broadcast topics
//! - [`retry`] -- Reconnect policy and connection state machine
//! - [`error`] -- Public error type

pub mod bus;
pub mod channel;
pub mod error;
pub mod location;
pub mod replay;
pub mod retry;
pub mod simulated;
pub mod track;
pub mod tracker;

// Re-export the primary surface at crate root for convenience.
pub use bus::EventBus;
pub use channel::memory::{MemoryHandle, MemoryTransport};
pub use channel::nats::NatsTransport;
pub use channel::{ChannelError, ChannelTransport, ServerEventStream};
pub use error::TrackerError;
pub use location::{FixStream, LocationError, LocationSource, WatchOptions};
pub use replay::ReplaySource;
pub use retry::{ConnectionState, RetryPolicy};
pub use simulated::SimulatedSource;
pub use track::{DEFAULT_TRACK_CAPACITY, TrackBuffer};
pub use tracker::{ExpeditionTracker, SyncReport, TrackerConfig};
