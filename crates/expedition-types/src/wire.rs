//! Wire protocol payloads exchanged over the real-time event channel.
//!
//! The protocol is consumed, not defined, by this workspace: the remote
//! service speaks it to every connected client. Payloads are JSON with an
//! internal `type` tag.
//!
//! Client-to-server traffic is [`ClientEvent`]; server pushes are
//! [`ServerEvent`]. Transport-level connect/disconnect is not part of the
//! payload protocol and is handled by the channel layer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::geo::GpsPoint;
use crate::ids::{ExpeditionId, ParticipantId};
use crate::structs::{EmergencyAlert, Expedition, HealthMetrics, Participant, WeatherReport};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// An event emitted by the client toward the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join the logical room for one expedition.
    ///
    /// Sent once per successful transport connect, before any telemetry.
    JoinExpedition {
        /// The expedition to join.
        expedition_id: ExpeditionId,
        /// The participant this client is tracking for.
        participant_id: ParticipantId,
    },
    /// A device GPS sample.
    PositionUpdate {
        /// The expedition the sample belongs to.
        expedition_id: ExpeditionId,
        /// The participant the sample belongs to.
        participant_id: ParticipantId,
        /// The sample itself.
        point: GpsPoint,
    },
    /// A health sensor reading.
    HealthUpdate {
        /// The expedition the reading belongs to.
        expedition_id: ExpeditionId,
        /// The participant the reading belongs to.
        participant_id: ParticipantId,
        /// The readings themselves.
        metrics: HealthMetrics,
    },
    /// An emergency alert raised by this client.
    EmergencyAlert {
        /// The complete alert record.
        alert: EmergencyAlert,
    },
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// An event pushed by the remote service to subscribed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full refresh of the expedition aggregate.
    ExpeditionUpdate {
        /// The complete expedition snapshot.
        expedition: Expedition,
    },
    /// A position sample from another participant's feed.
    PositionUpdate {
        /// Whose position this is.
        participant_id: ParticipantId,
        /// The sample itself.
        point: GpsPoint,
    },
    /// Full refresh of the participant roster.
    ParticipantsUpdate {
        /// The complete roster.
        participants: Vec<Participant>,
    },
    /// A new weather report for the expedition area.
    WeatherUpdate {
        /// The report itself.
        report: WeatherReport,
    },
    /// An emergency alert relayed from any client in the room.
    EmergencyAlert {
        /// The complete alert record.
        alert: EmergencyAlert,
    },
}
