//! Multi-subscriber event bus.
//!
//! Local consumers (dashboards, loggers, recorders) attach here. Each
//! topic is an independent [`broadcast`] channel, so any number of
//! subscribers can listen to the same topic without clobbering each other,
//! and a slow subscriber only ever loses its own messages: if it falls
//! behind by more than the channel capacity it observes a `Lagged` error
//! and resumes from the newest event.
//!
//! Publishing with no subscribers attached is a no-op by design; the
//! tracker never requires anyone to be listening.

use tokio::sync::broadcast;

use expedition_types::{EmergencyAlert, Expedition, GpsPoint, Participant, WeatherReport};

/// Capacity of each broadcast topic.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// Per-topic broadcast channels for everything the tracker observes.
#[derive(Debug)]
pub struct EventBus {
    positions: broadcast::Sender<GpsPoint>,
    participants: broadcast::Sender<Vec<Participant>>,
    weather: broadcast::Sender<WeatherReport>,
    expeditions: broadcast::Sender<Expedition>,
    connection: broadcast::Sender<bool>,
    alerts: broadcast::Sender<EmergencyAlert>,
}

impl EventBus {
    /// Create a bus with no subscribers attached.
    pub fn new() -> Self {
        Self {
            positions: broadcast::channel(BROADCAST_CAPACITY).0,
            participants: broadcast::channel(BROADCAST_CAPACITY).0,
            weather: broadcast::channel(BROADCAST_CAPACITY).0,
            expeditions: broadcast::channel(BROADCAST_CAPACITY).0,
            connection: broadcast::channel(BROADCAST_CAPACITY).0,
            alerts: broadcast::channel(BROADCAST_CAPACITY).0,
        }
    }

    // -----------------------------------------------------------------------
    // Subscriber side
    // -----------------------------------------------------------------------

    /// Subscribe to position updates (device samples and remote
    /// participant feeds alike).
    pub fn subscribe_positions(&self) -> broadcast::Receiver<GpsPoint> {
        self.positions.subscribe()
    }

    /// Subscribe to participant roster refreshes.
    pub fn subscribe_participants(&self) -> broadcast::Receiver<Vec<Participant>> {
        self.participants.subscribe()
    }

    /// Subscribe to weather reports.
    pub fn subscribe_weather(&self) -> broadcast::Receiver<WeatherReport> {
        self.weather.subscribe()
    }

    /// Subscribe to full expedition aggregate refreshes.
    pub fn subscribe_expeditions(&self) -> broadcast::Receiver<Expedition> {
        self.expeditions.subscribe()
    }

    /// Subscribe to the connection flag; `true` means connected.
    pub fn subscribe_connection(&self) -> broadcast::Receiver<bool> {
        self.connection.subscribe()
    }

    /// Subscribe to emergency alerts, locally raised and relayed alike.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<EmergencyAlert> {
        self.alerts.subscribe()
    }

    // -----------------------------------------------------------------------
    // Publisher side (crate-internal)
    // -----------------------------------------------------------------------

    /// Broadcast a position update.
    pub(crate) fn publish_position(&self, point: GpsPoint) {
        let _ = self.positions.send(point);
    }

    /// Broadcast a roster refresh.
    pub(crate) fn publish_participants(&self, participants: Vec<Participant>) {
        let _ = self.participants.send(participants);
    }

    /// Broadcast a weather report.
    pub(crate) fn publish_weather(&self, report: WeatherReport) {
        let _ = self.weather.send(report);
    }

    /// Broadcast an expedition aggregate refresh.
    pub(crate) fn publish_expedition(&self, expedition: Expedition) {
        let _ = self.expeditions.send(expedition);
    }

    /// Broadcast the connection flag.
    pub(crate) fn publish_connection(&self, connected: bool) {
        let _ = self.connection.send(connected);
    }

    /// Broadcast an emergency alert.
    pub(crate) fn publish_alert(&self, alert: EmergencyAlert) {
        let _ = self.alerts.send(alert);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
