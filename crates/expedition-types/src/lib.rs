//! Shared type definitions for the Expedition Tracker.
//!
//! This crate is the single source of truth for all types used across the
//! workspace. Types defined here flow downstream to `TypeScript` via
//! `ts-rs` for the expedition dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Enumeration types (statuses, roles, alert kinds, weather)
//! - [`geo`] -- GPS sample types and distance helpers
//! - [`structs`] -- Core entity structs (expedition, participants, alerts)
//! - [`wire`] -- Wire protocol payloads for the real-time event channel

pub mod enums;
pub mod geo;
pub mod ids;
pub mod structs;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AlertKind, ExpeditionStatus, ParticipantRole, ParticipantStatus, SkyCondition,
};
pub use geo::{GpsPoint, LocationFix};
pub use ids::{AlertId, ExpeditionId, ParticipantId};
pub use structs::{EmergencyAlert, Expedition, HealthMetrics, Participant, WeatherReport};
pub use wire::{ClientEvent, ServerEvent};
