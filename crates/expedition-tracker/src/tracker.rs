//! The expedition tracking client.
//!
//! [`ExpeditionTracker`] bridges three worlds: the device's continuous
//! location stream, the remote real-time event channel, and local
//! subscribers on the [`EventBus`]. A connection supervisor task owns the
//! transport and runs the reconnect state machine; a sampling task owns
//! the location watch. The two lifecycles are independent while running --
//! sampling continues (and buffers) straight through an outage -- but
//! [`ExpeditionTracker::disconnect`] tears both down together.
//!
//! Durability rule: every position sample and health reading is written to
//! the offline queue as unsynced first; a successful live publish (or a
//! later replay) flips it to synced. Delivery is at-least-once, duplicates
//! possible, gaps not.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use expedition_store::{AlertLog, HealthQueue, PositionQueue, SnapshotStore, StorePool};
use expedition_types::{
    AlertKind, ClientEvent, EmergencyAlert, Expedition, ExpeditionId, GpsPoint, HealthMetrics,
    LocationFix, ParticipantId, ServerEvent,
};

use crate::bus::EventBus;
use crate::channel::{ChannelError, ChannelTransport, ServerEventStream};
use crate::error::TrackerError;
use crate::location::{LocationSource, WatchOptions};
use crate::retry::{ConnectionState, RetryPolicy};
use crate::track::{DEFAULT_TRACK_CAPACITY, TrackBuffer};

/// Buffered publish commands between API calls and the supervisor.
const COMMAND_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for an [`ExpeditionTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Reconnect schedule for the event channel.
    pub retry: RetryPolicy,
    /// Capacity of the in-memory GPS track buffer.
    pub track_capacity: usize,
}

impl TrackerConfig {
    /// Stock configuration: default retry policy, 100-point track buffer.
    pub const fn new() -> Self {
        Self {
            retry: RetryPolicy::new(),
            track_capacity: DEFAULT_TRACK_CAPACITY,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one [`ExpeditionTracker::sync_offline_data`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Records confirmed delivered during this pass.
    pub replayed: u64,
    /// Records still awaiting delivery after this pass.
    pub remaining: u64,
}

// ---------------------------------------------------------------------------
// Internal shared state
// ---------------------------------------------------------------------------

/// A publish request handed to the supervisor, with a reply slot so the
/// caller learns whether the transport accepted the event.
struct PublishCommand {
    event: ClientEvent,
    reply: oneshot::Sender<Result<(), ChannelError>>,
}

/// State shared between the public API, the supervisor task, and the
/// sampling task.
struct Shared {
    expedition_id: ExpeditionId,
    participant_id: ParticipantId,
    store: StorePool,
    bus: EventBus,
    track: RwLock<TrackBuffer>,
    connected: AtomicBool,
    commands: mpsc::Sender<PublishCommand>,
}

impl Shared {
    /// Flip the connection flag and notify subscribers.
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.bus.publish_connection(connected);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Hand an event to the supervisor and wait for the transport verdict.
    async fn try_publish(&self, event: ClientEvent) -> Result<(), TrackerError> {
        if !self.is_connected() {
            return Err(TrackerError::NotConnected);
        }
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PublishCommand { event, reply: tx })
            .await
            .map_err(|_| TrackerError::NotConnected)?;
        match rx.await {
            Ok(result) => result.map_err(TrackerError::from),
            // The supervisor was torn down mid-publish.
            Err(_) => Err(TrackerError::NotConnected),
        }
    }
}

/// Transport and command receiver, parked until `connect` spawns the
/// supervisor.
struct Boot<T> {
    transport: T,
    commands: mpsc::Receiver<PublishCommand>,
}

// ---------------------------------------------------------------------------
// ExpeditionTracker
// ---------------------------------------------------------------------------

/// Real-time tracking client for one expedition.
///
/// Construct with a transport and a store, `connect`, then
/// `start_tracking`. All event consumption happens through the
/// `subscribe_*` methods; any number of subscribers can attach to each
/// topic.
pub struct ExpeditionTracker<T: ChannelTransport> {
    shared: Arc<Shared>,
    policy: RetryPolicy,
    boot: Mutex<Option<Boot<T>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    watch: Mutex<Option<JoinHandle<()>>>,
}

impl<T: ChannelTransport> ExpeditionTracker<T> {
    /// Create a tracker with the stock configuration.
    pub fn new(
        expedition_id: ExpeditionId,
        participant_id: ParticipantId,
        transport: T,
        store: StorePool,
    ) -> Self {
        Self::with_config(
            expedition_id,
            participant_id,
            transport,
            store,
            TrackerConfig::new(),
        )
    }

    /// Create a tracker with explicit tunables.
    pub fn with_config(
        expedition_id: ExpeditionId,
        participant_id: ParticipantId,
        transport: T,
        store: StorePool,
        config: TrackerConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                expedition_id,
                participant_id,
                store,
                bus: EventBus::new(),
                track: RwLock::new(TrackBuffer::with_capacity(config.track_capacity)),
                connected: AtomicBool::new(false),
                commands: commands_tx,
            }),
            policy: config.retry,
            boot: Mutex::new(Some(Boot {
                transport,
                commands: commands_rx,
            })),
            supervisor: Mutex::new(None),
            watch: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Start the connection supervisor.
    ///
    /// Connect failures are not surfaced here: the supervisor falls into
    /// its backoff-retry loop and, after exhausting the failure budget,
    /// stops silently. Subscribers observe progress through the
    /// connection flag only. Calling `connect` again is a no-op.
    pub async fn connect(&self) {
        let Some(boot) = self.boot.lock().await.take() else {
            debug!("connect called with supervisor already started");
            return;
        };
        let shared = Arc::clone(&self.shared);
        let policy = self.policy;
        let handle = tokio::spawn(run_supervisor(boot.transport, boot.commands, shared, policy));
        *self.supervisor.lock().await = Some(handle);
    }

    /// Coarse teardown: stops the location watch and the channel
    /// supervisor together.
    ///
    /// Terminal for this instance -- the transport was consumed by
    /// `connect`, so build a fresh tracker to reconnect.
    pub async fn disconnect(&self) {
        self.stop_tracking().await;
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
            info!("disconnected from event channel");
        }
        if self.shared.is_connected() {
            self.shared.set_connected(false);
        }
    }

    /// Whether the event channel is currently up.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    // -----------------------------------------------------------------------
    // Location tracking
    // -----------------------------------------------------------------------

    /// Begin continuous device-location sampling.
    ///
    /// Each fix is stamped with arrival time, pushed into the capped
    /// track buffer, broadcast to subscribers, written unsynced to the
    /// offline queue, and -- when connected -- published live (marking
    /// the queued record synced on success). Calling again restarts the
    /// watch with the new options.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Location`] when the source refuses the
    /// watch (permission denied, unavailable, timeout). The tracker takes
    /// no corrective action; recovery belongs to the caller.
    pub async fn start_tracking<S: LocationSource>(
        &self,
        source: &S,
        options: WatchOptions,
    ) -> Result<(), TrackerError> {
        let mut stream = source.watch(options).await?;

        let mut watch = self.watch.lock().await;
        if let Some(handle) = watch.take() {
            handle.abort();
            debug!("restarting location watch");
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            while let Some(fix) = stream.recv().await {
                handle_fix(&shared, &fix).await;
            }
            debug!("location stream ended");
        });
        *watch = Some(handle);

        info!(
            high_accuracy = options.high_accuracy,
            interval_ms = u64::try_from(options.sample_interval.as_millis()).unwrap_or(u64::MAX),
            "location tracking started"
        );
        Ok(())
    }

    /// Cancel the location watch. Idempotent; never fails.
    pub async fn stop_tracking(&self) {
        if let Some(handle) = self.watch.lock().await.take() {
            handle.abort();
            info!("location tracking stopped");
        }
    }

    // -----------------------------------------------------------------------
    // Telemetry operations
    // -----------------------------------------------------------------------

    /// Replay unsynced offline records over the channel.
    ///
    /// Positions first, then health readings, each in storage iteration
    /// order. A record is marked synced only after its publish succeeds;
    /// the first failure halts that queue's pass and leaves the remainder
    /// untouched. Returns immediately with `replayed = 0` while
    /// disconnected. At-least-once: a crash between publish and mark
    /// yields a duplicate on the next pass, never a loss.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] if the offline queues cannot be
    /// read or updated.
    pub async fn sync_offline_data(&self) -> Result<SyncReport, TrackerError> {
        let shared = &self.shared;
        let positions = PositionQueue::new(shared.store.inner());
        let health = HealthQueue::new(shared.store.inner());

        if !shared.is_connected() {
            let remaining = positions
                .unsynced_count(shared.expedition_id)
                .await?
                .saturating_add(health.unsynced_count(shared.expedition_id).await?);
            debug!(remaining, "offline sync skipped while disconnected");
            return Ok(SyncReport {
                replayed: 0,
                remaining,
            });
        }

        let mut replayed: u64 = 0;

        for record in positions.unsynced(shared.expedition_id).await? {
            let event = ClientEvent::PositionUpdate {
                expedition_id: record.expedition_id,
                participant_id: shared.participant_id,
                point: record.point,
            };
            match shared.try_publish(event).await {
                Ok(()) => {
                    positions.mark_synced(record.id).await?;
                    replayed = replayed.saturating_add(1);
                }
                Err(e) => {
                    warn!(error = %e, "position replay halted, records stay queued");
                    break;
                }
            }
        }

        for record in health.unsynced(shared.expedition_id).await? {
            let event = ClientEvent::HealthUpdate {
                expedition_id: record.expedition_id,
                participant_id: record.participant_id,
                metrics: record.metrics,
            };
            match shared.try_publish(event).await {
                Ok(()) => {
                    health.mark_synced(record.id).await?;
                    replayed = replayed.saturating_add(1);
                }
                Err(e) => {
                    warn!(error = %e, "health replay halted, records stay queued");
                    break;
                }
            }
        }

        let remaining = positions
            .unsynced_count(shared.expedition_id)
            .await?
            .saturating_add(health.unsynced_count(shared.expedition_id).await?);
        info!(replayed, remaining, "offline sync pass complete");
        Ok(SyncReport { replayed, remaining })
    }

    /// Raise an emergency alert from the most recent buffered position.
    ///
    /// The alert is always persisted to the local log first, whatever the
    /// connection state, then broadcast to local subscribers, then --
    /// when connected -- published fire-and-forget: no acknowledgement,
    /// no retry loop.
    pub async fn send_emergency_alert(
        &self,
        kind: AlertKind,
        message: impl Into<String> + Send,
    ) -> EmergencyAlert {
        let shared = &self.shared;
        let position = shared.track.read().await.latest().copied();
        let alert = EmergencyAlert::raise(shared.expedition_id, kind, message, position);

        let log = AlertLog::new(shared.store.inner());
        if let Err(e) = log.record(&alert).await {
            warn!(error = %e, "failed to persist emergency alert locally");
        }

        shared.bus.publish_alert(alert.clone());

        if shared.is_connected() {
            let event = ClientEvent::EmergencyAlert {
                alert: alert.clone(),
            };
            if let Err(e) = shared.try_publish(event).await {
                warn!(error = %e, "emergency alert publish failed; alert remains in the local log");
            }
        } else {
            warn!(kind = ?alert.kind, "emergency alert raised while disconnected; stored locally only");
        }

        alert
    }

    /// Record a health reading and forward it when connected.
    ///
    /// Readings share the positions' durability rule: queued unsynced
    /// first, marked synced after a successful live publish, replayed by
    /// `sync_offline_data` otherwise.
    pub async fn update_health_metrics(&self, metrics: HealthMetrics) {
        let shared = &self.shared;
        let queue = HealthQueue::new(shared.store.inner());
        let row = match queue
            .enqueue(shared.expedition_id, shared.participant_id, &metrics)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "failed to queue health reading");
                None
            }
        };

        if shared.is_connected() {
            let event = ClientEvent::HealthUpdate {
                expedition_id: shared.expedition_id,
                participant_id: shared.participant_id,
                metrics,
            };
            match shared.try_publish(event).await {
                Ok(()) => {
                    if let Some(id) = row {
                        if let Err(e) = queue.mark_synced(id).await {
                            warn!(error = %e, "failed to mark health reading synced");
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "live health publish failed, reading stays queued");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors and subscriptions
    // -----------------------------------------------------------------------

    /// The expedition this tracker is scoped to.
    pub fn expedition_id(&self) -> ExpeditionId {
        self.shared.expedition_id
    }

    /// The participant this tracker reports for.
    pub fn participant_id(&self) -> ParticipantId {
        self.shared.participant_id
    }

    /// The most recent buffered device position, if any.
    pub async fn latest_position(&self) -> Option<GpsPoint> {
        self.shared.track.read().await.latest().copied()
    }

    /// The buffered device track, oldest first.
    pub async fn track(&self) -> Vec<GpsPoint> {
        self.shared.track.read().await.to_vec()
    }

    /// The last cached expedition aggregate, if the service has pushed
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] if the snapshot store cannot be
    /// read.
    pub async fn cached_expedition(&self) -> Result<Option<Expedition>, TrackerError> {
        let snapshots = SnapshotStore::new(self.shared.store.inner());
        Ok(snapshots.get(self.shared.expedition_id).await?)
    }

    /// Subscribe to position updates.
    pub fn subscribe_positions(&self) -> tokio::sync::broadcast::Receiver<GpsPoint> {
        self.shared.bus.subscribe_positions()
    }

    /// Subscribe to participant roster refreshes.
    pub fn subscribe_participants(
        &self,
    ) -> tokio::sync::broadcast::Receiver<Vec<expedition_types::Participant>> {
        self.shared.bus.subscribe_participants()
    }

    /// Subscribe to weather reports.
    pub fn subscribe_weather(
        &self,
    ) -> tokio::sync::broadcast::Receiver<expedition_types::WeatherReport> {
        self.shared.bus.subscribe_weather()
    }

    /// Subscribe to expedition aggregate refreshes.
    pub fn subscribe_expeditions(&self) -> tokio::sync::broadcast::Receiver<Expedition> {
        self.shared.bus.subscribe_expeditions()
    }

    /// Subscribe to the connection flag; `true` means connected.
    pub fn subscribe_connection(&self) -> tokio::sync::broadcast::Receiver<bool> {
        self.shared.bus.subscribe_connection()
    }

    /// Subscribe to emergency alerts.
    pub fn subscribe_alerts(&self) -> tokio::sync::broadcast::Receiver<EmergencyAlert> {
        self.shared.bus.subscribe_alerts()
    }
}

// ---------------------------------------------------------------------------
// Sampling task
// ---------------------------------------------------------------------------

/// Process one fix from the location stream.
///
/// Storage failures are logged and swallowed: losing the durable copy of
/// one sample must not stop the live stream.
async fn handle_fix(shared: &Shared, fix: &LocationFix) {
    let point = GpsPoint::from_fix(fix, Utc::now());
    shared.track.write().await.push(point);
    shared.bus.publish_position(point);

    let queue = PositionQueue::new(shared.store.inner());
    let row = match queue.enqueue(shared.expedition_id, &point).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "failed to queue position sample");
            None
        }
    };

    if shared.is_connected() {
        let event = ClientEvent::PositionUpdate {
            expedition_id: shared.expedition_id,
            participant_id: shared.participant_id,
            point,
        };
        match shared.try_publish(event).await {
            Ok(()) => {
                if let Some(id) = row {
                    if let Err(e) = queue.mark_synced(id).await {
                        warn!(error = %e, "failed to mark position synced");
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "live position publish failed, sample stays queued");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection supervisor
// ---------------------------------------------------------------------------

/// Run the channel state machine until teardown or give-up.
///
/// ```text
/// Connecting -> Connected <-> Disconnected -> (retry | GaveUp)
/// ```
///
/// The failure counter resets on every successful transport connect, so
/// only consecutive failures consume the budget.
async fn run_supervisor<T: ChannelTransport>(
    mut transport: T,
    mut commands: mpsc::Receiver<PublishCommand>,
    shared: Arc<Shared>,
    policy: RetryPolicy,
) {
    let mut failures: u32 = 0;
    loop {
        debug!(state = ?ConnectionState::Connecting, "attempting channel connect");
        match transport.connect().await {
            Ok(mut events) => {
                failures = 0;
                shared.set_connected(true);
                info!(
                    expedition_id = %shared.expedition_id,
                    state = ?ConnectionState::Connected,
                    "event channel up"
                );

                let join = ClientEvent::JoinExpedition {
                    expedition_id: shared.expedition_id,
                    participant_id: shared.participant_id,
                };
                match transport.publish(&join).await {
                    Ok(()) => debug!("joined expedition room"),
                    // Fire-and-forget, like every other emit: the room
                    // join rides on the next reconnect if it was lost.
                    Err(e) => warn!(error = %e, "failed to join expedition room"),
                }

                let caller_gone = pump(&mut transport, &mut commands, &mut events, &shared).await;
                shared.set_connected(false);
                if caller_gone {
                    transport.close().await;
                    return;
                }
                // Losing an established connection is not a connect
                // error: retry immediately, with a fresh failure budget.
                warn!(state = ?ConnectionState::Disconnected, "event channel lost");
            }
            Err(e) => {
                warn!(error = %e, "channel connect failed");
                failures = failures.saturating_add(1);
                match policy.delay_for(failures) {
                    Some(delay) => {
                        debug!(
                            failures,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "scheduling reconnect"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        info!(
                            failures,
                            state = ?ConnectionState::GaveUp,
                            "reconnect budget exhausted, giving up"
                        );
                        return;
                    }
                }
            }
        }
    }
}

/// Pump one connected session: publish commands up, dispatch server
/// events down. Returns `true` when the command side is gone (tracker
/// torn down), `false` when the transport dropped.
async fn pump<T: ChannelTransport>(
    transport: &mut T,
    commands: &mut mpsc::Receiver<PublishCommand>,
    events: &mut ServerEventStream,
    shared: &Shared,
) -> bool {
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(PublishCommand { event, reply }) => {
                        let result = transport.publish(&event).await;
                        if let Err(e) = &result {
                            warn!(error = %e, "publish rejected by transport");
                        }
                        let _ = reply.send(result);
                    }
                    None => return true,
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => dispatch(event, shared).await,
                    None => return false,
                }
            }
        }
    }
}

/// Route one server push to the snapshot cache and the event bus.
async fn dispatch(event: ServerEvent, shared: &Shared) {
    match event {
        ServerEvent::ExpeditionUpdate { expedition } => {
            let snapshots = SnapshotStore::new(shared.store.inner());
            if let Err(e) = snapshots.put(&expedition).await {
                warn!(error = %e, "failed to cache expedition snapshot");
            }
            shared.bus.publish_expedition(expedition);
        }
        ServerEvent::PositionUpdate {
            participant_id,
            point,
        } => {
            debug!(participant_id = %participant_id, "participant position update");
            shared.bus.publish_position(point);
        }
        ServerEvent::ParticipantsUpdate { participants } => {
            shared.bus.publish_participants(participants);
        }
        ServerEvent::WeatherUpdate { report } => {
            shared.bus.publish_weather(report);
        }
        ServerEvent::EmergencyAlert { alert } => {
            shared.bus.publish_alert(alert);
        }
    }
}
