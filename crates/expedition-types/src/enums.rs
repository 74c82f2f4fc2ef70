//! Enumeration types shared across the Expedition Tracker workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Expedition lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of an expedition.
///
/// Owned by the remote service; the client only ever reads it from pushed
/// expedition snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ExpeditionStatus {
    /// Route planned, not yet underway.
    Planning,
    /// Currently in the field.
    Active,
    /// Temporarily halted (weather hold, rest day).
    Paused,
    /// Finished and everyone accounted for.
    Completed,
    /// Abandoned before reaching the objective.
    Aborted,
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Role a participant plays within the expedition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Expedition leader, responsible for go/no-go calls.
    Leader,
    /// Certified guide.
    Guide,
    /// Regular climbing member.
    Climber,
    /// Base-camp or logistics support.
    Support,
    /// Designated medic.
    Medic,
}

/// Current status of a participant, as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Moving with the group.
    Active,
    /// Stationary at a camp or rest stop.
    Resting,
    /// Heading back down.
    Descending,
    /// Out of contact past the check-in window.
    Missing,
    /// Removed from the mountain.
    Evacuated,
}

// ---------------------------------------------------------------------------
// Emergencies
// ---------------------------------------------------------------------------

/// Category of an emergency alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Injury or illness requiring assistance.
    Medical,
    /// Dangerous weather closing in.
    Weather,
    /// Avalanche observed or triggered.
    Avalanche,
    /// A fall has occurred.
    Fall,
    /// A participant is lost or separated.
    Lost,
    /// Critical equipment failure.
    Equipment,
    /// General distress call.
    Sos,
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// Observed sky condition in a weather report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SkyCondition {
    /// Clear skies.
    Clear,
    /// Overcast or partly cloudy.
    Cloudy,
    /// Fog reducing visibility.
    Fog,
    /// Rainfall.
    Rain,
    /// Snowfall.
    Snow,
    /// Active storm.
    Storm,
    /// Whiteout conditions, near-zero visibility.
    Whiteout,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExpeditionStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&AlertKind::Avalanche).unwrap(),
            "\"avalanche\""
        );
        assert_eq!(
            serde_json::to_string(&SkyCondition::Whiteout).unwrap(),
            "\"whiteout\""
        );
    }

    #[test]
    fn enums_deserialize_snake_case() {
        let role: ParticipantRole = serde_json::from_str("\"medic\"").unwrap();
        assert_eq!(role, ParticipantRole::Medic);
        let status: ParticipantStatus = serde_json::from_str("\"descending\"").unwrap();
        assert_eq!(status, ParticipantStatus::Descending);
    }
}
