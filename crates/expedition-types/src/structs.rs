//! Core entity structs for the Expedition Tracker.
//!
//! The remote service owns [`Expedition`] and its [`Participant`] roster;
//! the client holds read-only cached copies refreshed by pushed updates.
//! [`EmergencyAlert`] is the one entity the client creates itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    AlertKind, ExpeditionStatus, ParticipantRole, ParticipantStatus, SkyCondition,
};
use crate::geo::GpsPoint;
use crate::ids::{AlertId, ExpeditionId, ParticipantId};

// ---------------------------------------------------------------------------
// Expedition
// ---------------------------------------------------------------------------

/// Aggregate state of a tracked expedition.
///
/// Owned by the remote service. The client caches the last pushed copy in
/// the local snapshot store so dashboards keep rendering through outages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Expedition {
    /// Unique expedition identifier.
    pub id: ExpeditionId,
    /// Human-readable expedition name.
    pub name: String,
    /// Current lifecycle status.
    pub status: ExpeditionStatus,
    /// Most recent known group position, if any.
    pub current_position: Option<GpsPoint>,
    /// Planned or recorded route as an ordered list of points.
    pub route: Vec<GpsPoint>,
    /// Everyone on the expedition.
    pub participants: Vec<Participant>,
    /// Latest weather report for the area, if any.
    pub weather: Option<WeatherReport>,
    /// When the expedition started.
    pub started_at: DateTime<Utc>,
    /// Planned end time.
    pub estimated_end: DateTime<Utc>,
    /// Actual end time, once the expedition has concluded.
    pub actual_end: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A tracked person within an expedition.
///
/// Updated by server push events; the client never mutates a participant
/// record directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Participant {
    /// Unique participant identifier.
    pub id: ParticipantId,
    /// Participant's name.
    pub name: String,
    /// Role within the expedition.
    pub role: ParticipantRole,
    /// Last reported position, if any.
    pub position: Option<GpsPoint>,
    /// Most recent health readings.
    pub health: HealthMetrics,
    /// Current participant status.
    pub status: ParticipantStatus,
    /// When this record was last updated by the service.
    pub last_update: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// HealthMetrics
// ---------------------------------------------------------------------------

/// Flat numeric health readings for a participant.
///
/// No derived invariants; values are forwarded as the sensors report them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthMetrics {
    /// Heart rate in beats per minute.
    pub heart_rate_bpm: f64,
    /// Blood oxygen saturation as a percentage.
    pub spo2_pct: f64,
    /// Core body temperature in degrees Celsius.
    pub body_temp_c: f64,
    /// Respiration rate in breaths per minute.
    pub respiration_rpm: f64,
    /// When the readings were taken.
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WeatherReport
// ---------------------------------------------------------------------------

/// Flat numeric weather readings pushed by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WeatherReport {
    /// Observed sky condition.
    pub condition: SkyCondition,
    /// Air temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Sustained wind speed in meters per second.
    pub wind_speed_mps: f64,
    /// Peak gust speed in meters per second, if reported.
    pub wind_gust_mps: Option<f64>,
    /// Visibility in meters.
    pub visibility_m: f64,
    /// Barometric pressure in hectopascals.
    pub pressure_hpa: f64,
    /// When the report was issued.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EmergencyAlert
// ---------------------------------------------------------------------------

/// An urgent, fire-and-forget notification tied to the last known position.
///
/// Write-once: an alert is never edited after creation. The tracker always
/// persists a local copy before attempting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EmergencyAlert {
    /// Unique alert identifier.
    pub id: AlertId,
    /// Category of the emergency.
    pub kind: AlertKind,
    /// Human-readable description.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
    /// Last known position when the alert was raised, if any.
    pub position: Option<GpsPoint>,
    /// The expedition this alert belongs to.
    pub expedition_id: ExpeditionId,
}

impl EmergencyAlert {
    /// Build a new alert raised now, with a fresh identifier.
    pub fn raise(
        expedition_id: ExpeditionId,
        kind: AlertKind,
        message: impl Into<String>,
        position: Option<GpsPoint>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            kind,
            message: message.into(),
            raised_at: Utc::now(),
            position,
            expedition_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn raised_alert_carries_expedition_and_position() {
        let expedition_id = ExpeditionId::new();
        let alert = EmergencyAlert::raise(expedition_id, AlertKind::Medical, "twisted ankle", None);
        assert_eq!(alert.expedition_id, expedition_id);
        assert_eq!(alert.kind, AlertKind::Medical);
        assert!(alert.position.is_none());
    }

    #[test]
    fn expedition_round_trips_through_json() {
        let expedition = Expedition {
            id: ExpeditionId::new(),
            name: "Rainier North Face".to_owned(),
            status: ExpeditionStatus::Active,
            current_position: None,
            route: Vec::new(),
            participants: Vec::new(),
            weather: None,
            started_at: Utc::now(),
            estimated_end: Utc::now(),
            actual_end: None,
        };
        let json = serde_json::to_string(&expedition).unwrap();
        let back: Expedition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expedition);
    }
}
