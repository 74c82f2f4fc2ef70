//! NATS transport for the event channel.
//!
//! Each expedition is a logical room carried on a family of subjects.
//! The client publishes uplink events and subscribes to the downlink
//! wildcard; payloads are the self-describing JSON envelopes from
//! `expedition-types::wire`.
//!
//! # Subject Patterns
//!
//! | Pattern | Direction | Payload |
//! |---------|-----------|---------|
//! | `expedition.{id}.up.join` | client -> server | [`ClientEvent::JoinExpedition`] |
//! | `expedition.{id}.up.position` | client -> server | [`ClientEvent::PositionUpdate`] |
//! | `expedition.{id}.up.health` | client -> server | [`ClientEvent::HealthUpdate`] |
//! | `expedition.{id}.up.alert` | client -> server | [`ClientEvent::EmergencyAlert`] |
//! | `expedition.{id}.down.>` | server -> client | [`ServerEvent`] (any) |
//!
//! The NATS client library keeps its own transparent reconnect machinery
//! under an established connection; the supervisor's backoff policy governs
//! what this transport reports -- failed initial connects and a terminated
//! subscription stream.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use expedition_types::{ClientEvent, ExpeditionId, ServerEvent};

use crate::channel::{ChannelError, ChannelTransport, EVENT_CHANNEL_CAPACITY, ServerEventStream};

/// NATS-backed implementation of [`ChannelTransport`].
pub struct NatsTransport {
    url: String,
    expedition_id: ExpeditionId,
    client: Option<async_nats::Client>,
}

impl NatsTransport {
    /// Create a transport that will connect to `url` and join the room
    /// for `expedition_id`.
    pub const fn new(url: String, expedition_id: ExpeditionId) -> Self {
        Self {
            url,
            expedition_id,
            client: None,
        }
    }

    /// Uplink subject for one client event kind.
    fn uplink_subject(&self, event: &ClientEvent) -> String {
        let suffix = match event {
            ClientEvent::JoinExpedition { .. } => "join",
            ClientEvent::PositionUpdate { .. } => "position",
            ClientEvent::HealthUpdate { .. } => "health",
            ClientEvent::EmergencyAlert { .. } => "alert",
        };
        format!("expedition.{}.up.{suffix}", self.expedition_id)
    }

    /// Downlink wildcard subscription subject.
    fn downlink_subject(&self) -> String {
        format!("expedition.{}.down.>", self.expedition_id)
    }
}

impl ChannelTransport for NatsTransport {
    async fn connect(&mut self) -> Result<ServerEventStream, ChannelError> {
        let client = async_nats::connect(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(format!("failed to connect to {}: {e}", self.url)))?;

        let subject = self.downlink_subject();
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| ChannelError::Connect(format!("failed to subscribe to {subject}: {e}")))?;

        info!(url = %self.url, subject = %subject, "connected to event channel");

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<ServerEvent>(&message.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            debug!("server event stream dropped, ending subscription pump");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(subject = %message.subject, error = %e, "ignoring malformed server event");
                    }
                }
            }
            debug!("subscription ended");
            // tx drops here; the supervisor sees the stream close.
        });

        self.client = Some(client);
        Ok(rx)
    }

    async fn publish(&mut self, event: &ClientEvent) -> Result<(), ChannelError> {
        let Some(client) = self.client.as_ref() else {
            return Err(ChannelError::Closed);
        };

        let subject = self.uplink_subject(event);
        let payload = serde_json::to_vec(event)?;
        client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| ChannelError::Publish(format!("publish to {subject} failed: {e}")))?;

        // Flush before reporting success: offline-queue records are marked
        // synced on the strength of this return value.
        client
            .flush()
            .await
            .map_err(|e| ChannelError::Publish(format!("flush after {subject} failed: {e}")))?;

        Ok(())
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            info!("event channel closed");
        }
    }
}
