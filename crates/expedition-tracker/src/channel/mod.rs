//! Event channel abstraction.
//!
//! The remote service speaks a small JSON event protocol over a pub/sub
//! channel. [`ChannelTransport`] is the seam between the tracker's
//! connection supervisor and the concrete wiring: [`nats::NatsTransport`]
//! in the field, [`memory::MemoryTransport`] in tests and offline demos.
//!
//! A transport is deliberately dumb: one connect attempt at a time, no
//! internal retry schedule of its own at this layer. The supervisor owns
//! the backoff policy.

pub mod memory;
pub mod nats;

use tokio::sync::mpsc;

use expedition_types::{ClientEvent, ServerEvent};

/// Buffered server events per connection before backpressure applies.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors raised by a channel transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A connect attempt failed.
    #[error("channel connect failed: {0}")]
    Connect(String),

    /// A publish was not accepted by the transport.
    #[error("channel publish failed: {0}")]
    Publish(String),

    /// The transport is closed; no operation can proceed.
    #[error("channel is closed")]
    Closed,

    /// A payload could not be encoded or decoded.
    #[error("channel payload error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Stream of server pushes for one transport connection.
///
/// The stream ending (`recv()` returning `None`) is the transport-level
/// disconnect signal.
pub type ServerEventStream = mpsc::Receiver<ServerEvent>;

/// One concrete wiring of the event channel.
///
/// `connect` performs a single attempt and, on success, hands back the
/// connection's server-push stream. `publish` sends one client event over
/// the current connection. `close` tears the connection down; the
/// transport may be connected again afterwards.
pub trait ChannelTransport: Send + 'static {
    /// Attempt one connection, returning the server-push stream on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] when the attempt fails; the
    /// supervisor decides whether and when to try again.
    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<ServerEventStream, ChannelError>> + Send;

    /// Publish one client event over the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] when no connection is up, or
    /// [`ChannelError::Publish`] when the transport rejects the event.
    fn publish(
        &mut self,
        event: &ClientEvent,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Tear down the current connection, if any.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
