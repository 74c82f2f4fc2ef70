//! Field agent entry point for the Expedition Tracker.
//!
//! The agent wires a location source and an event-channel transport into
//! an [`ExpeditionTracker`], then runs until interrupted: samples flow to
//! the channel and the offline queue, a periodic sync pass replays
//! anything recorded during outages, and subscriber tasks log what the
//! tracker observes.
//!
//! # Architecture
//!
//! ```text
//! LocationSource --> ExpeditionTracker --> NATS (or in-process channel)
//!                         |
//!                         +--> SQLite offline queue <-- sync loop
//!                         +--> log subscribers (position/connection/alerts)
//! ```

mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use expedition_store::{HealthQueue, PositionQueue, StorePool};
use expedition_tracker::{
    ChannelTransport, ExpeditionTracker, MemoryTransport, NatsTransport, ReplaySource,
    SimulatedSource, TrackerConfig,
};
use expedition_types::{ExpeditionId, GpsPoint, LocationFix};

use crate::config::{AgentConfig, ChannelMode, ConfigError, SourceMode, SyncConfig};

/// Application entry point.
///
/// Loads configuration, opens the local store, selects the transport and
/// location source, then tracks until SIGINT.
///
/// # Errors
///
/// Returns an error if initialization fails; tracking itself only ends on
/// shutdown.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (missing file means defaults: simulated source,
    // in-process channel).
    let config_path = std::env::var("EXPEDITION_CONFIG")
        .unwrap_or_else(|_| "expedition-config.yaml".to_owned());
    let config = if Path::new(&config_path).exists() {
        AgentConfig::from_file(Path::new(&config_path))?
    } else {
        AgentConfig::default()
    };

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("expedition-agent starting");

    let expedition_id = config.expedition.expedition_id()?;
    let participant_id = config.expedition.participant_id()?;
    info!(
        expedition_id = %expedition_id,
        participant_id = %participant_id,
        storage_path = config.storage.path,
        "configuration loaded"
    );

    // Open the local store.
    let store = StorePool::connect(&config.storage.path).await?;
    store.run_migrations().await?;

    let tracker_config = TrackerConfig {
        retry: config.retry.policy(),
        ..TrackerConfig::new()
    };

    match config.channel.mode {
        ChannelMode::Nats => {
            info!(url = config.channel.url, "using NATS event channel");
            let transport = NatsTransport::new(config.channel.url.clone(), expedition_id);
            let tracker = ExpeditionTracker::with_config(
                expedition_id,
                participant_id,
                transport,
                store.clone(),
                tracker_config,
            );
            run(tracker, store, expedition_id, &config).await
        }
        ChannelMode::Memory => {
            info!("using in-process event channel (demo mode)");
            let (transport, _handle) = MemoryTransport::new();
            let tracker = ExpeditionTracker::with_config(
                expedition_id,
                participant_id,
                transport,
                store.clone(),
                tracker_config,
            );
            run(tracker, store, expedition_id, &config).await
        }
    }
}

/// Run one wired tracker until SIGINT.
async fn run<T: ChannelTransport>(
    tracker: ExpeditionTracker<T>,
    store: StorePool,
    expedition_id: ExpeditionId,
    config: &AgentConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let tracker = Arc::new(tracker);
    spawn_subscriber_logs(&tracker);

    tracker.connect().await;

    let options = config.tracking.options();
    match config.source.mode {
        SourceMode::Simulated => {
            let mut source = SimulatedSource::new(config.source.base.fix());
            if let Some(seed) = config.source.seed {
                source = source.with_seed(seed);
            }
            info!(
                lat = config.source.base.lat,
                lon = config.source.base.lon,
                "tracking a simulated walk"
            );
            tracker.start_tracking(&source, options).await?;
        }
        SourceMode::Replay => {
            let path = config.source.replay_path.as_deref().ok_or_else(|| {
                ConfigError::Invalid("source.replay_path is required in replay mode".to_owned())
            })?;
            let fixes: Vec<LocationFix> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            info!(path, fixes = fixes.len(), "replaying a recorded track");
            let source = ReplaySource::new(fixes).paced();
            tracker.start_tracking(&source, options).await?;
        }
    }

    let sync_task = spawn_sync_loop(Arc::clone(&tracker), store, expedition_id, config.sync);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    sync_task.abort();
    tracker.stop_tracking().await;
    tracker.disconnect().await;
    info!("expedition-agent stopped");
    Ok(())
}

/// Attach logging subscribers to the tracker's event bus.
///
/// Stand-ins for a dashboard: positions (with cumulative distance),
/// connection flags, weather, and emergency alerts all land in the log.
fn spawn_subscriber_logs<T: ChannelTransport>(tracker: &Arc<ExpeditionTracker<T>>) {
    let mut positions = tracker.subscribe_positions();
    tokio::spawn(async move {
        let mut last: Option<GpsPoint> = None;
        let mut travelled_m = 0.0_f64;
        loop {
            match positions.recv().await {
                Ok(point) => {
                    if let Some(previous) = last {
                        travelled_m += previous.distance_m(&point);
                    }
                    last = Some(point);
                    info!(
                        lat = point.lat,
                        lon = point.lon,
                        altitude_m = point.altitude_m,
                        travelled_m,
                        "position"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "position subscriber lagged, skipping ahead");
                }
                Err(RecvError::Closed) => return,
            }
        }
    });

    let mut connection = tracker.subscribe_connection();
    tokio::spawn(async move {
        loop {
            match connection.recv().await {
                Ok(true) => info!("event channel connected"),
                Ok(false) => warn!("event channel disconnected"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
        }
    });

    let mut weather = tracker.subscribe_weather();
    tokio::spawn(async move {
        loop {
            match weather.recv().await {
                Ok(report) => info!(
                    condition = ?report.condition,
                    temperature_c = report.temperature_c,
                    wind_mps = report.wind_speed_mps,
                    "weather update"
                ),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
        }
    });

    let mut alerts = tracker.subscribe_alerts();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => warn!(
                    kind = ?alert.kind,
                    message = %alert.message,
                    "emergency alert"
                ),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
        }
    });
}

/// Periodically replay offline records and prune delivered rows.
fn spawn_sync_loop<T: ChannelTransport>(
    tracker: Arc<ExpeditionTracker<T>>,
    store: StorePool,
    expedition_id: ExpeditionId,
    sync: SyncConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(sync.interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !tracker.is_connected() {
                continue;
            }
            match tracker.sync_offline_data().await {
                Ok(report) if report.replayed > 0 => info!(
                    replayed = report.replayed,
                    remaining = report.remaining,
                    "offline records replayed"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "offline sync failed"),
            }
            if sync.purge_synced {
                let positions = PositionQueue::new(store.inner());
                if let Err(e) = positions.purge_synced(expedition_id).await {
                    warn!(error = %e, "failed to purge delivered positions");
                }
                let health = HealthQueue::new(store.inner());
                if let Err(e) = health.purge_synced(expedition_id).await {
                    warn!(error = %e, "failed to purge delivered health readings");
                }
            }
        }
    })
}
