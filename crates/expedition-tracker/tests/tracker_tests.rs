//! Integration tests for the tracking client.
//!
//! All tests run against the in-memory channel transport and an in-memory
//! `SQLite` store, so no external services are required.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::float_cmp,
    clippy::items_after_statements,
    clippy::too_many_lines
)]

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use expedition_store::{AlertLog, PositionQueue, StorePool};
use expedition_tracker::{
    ExpeditionTracker, FixStream, LocationError, LocationSource, MemoryHandle, MemoryTransport,
    ReplaySource, RetryPolicy, TrackerConfig, TrackerError, WatchOptions,
};
use expedition_types::{
    AlertKind, ClientEvent, Expedition, ExpeditionId, ExpeditionStatus, GpsPoint, LocationFix,
    ParticipantId, ServerEvent, SkyCondition, WeatherReport,
};

// =============================================================================
// Helpers
// =============================================================================

/// A retry schedule fast enough for tests: same shape, millisecond scale.
fn fast_config() -> TrackerConfig {
    TrackerConfig {
        retry: RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(8)),
        track_capacity: 100,
    }
}

async fn setup_store() -> StorePool {
    let pool = StorePool::in_memory().await.expect("Failed to open store");
    pool.run_migrations().await.expect("Failed to migrate");
    pool
}

async fn setup_tracker() -> (
    ExpeditionTracker<MemoryTransport>,
    MemoryHandle,
    StorePool,
    ExpeditionId,
) {
    let store = setup_store().await;
    let expedition_id = ExpeditionId::new();
    let (transport, handle) = MemoryTransport::new();
    let tracker = ExpeditionTracker::with_config(
        expedition_id,
        ParticipantId::new(),
        transport,
        store.clone(),
        fast_config(),
    );
    (tracker, handle, store, expedition_id)
}

/// Drain the connection topic until the expected flag arrives.
async fn wait_for_flag(rx: &mut broadcast::Receiver<bool>, expected: bool) {
    timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(flag) if flag == expected => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("connection topic closed before flag arrived")
                }
            }
        }
    })
    .await
    .expect("Timed out waiting for connection flag");
}

fn fix(lat: f64, lon: f64) -> LocationFix {
    LocationFix::new(lat, lon, 3200.0, 10.0)
}

fn sample_expedition(id: ExpeditionId) -> Expedition {
    Expedition {
        id,
        name: "Rainier North Face".to_owned(),
        status: ExpeditionStatus::Active,
        current_position: None,
        route: Vec::new(),
        participants: Vec::new(),
        weather: None,
        started_at: Utc::now(),
        estimated_end: Utc::now(),
        actual_end: None,
    }
}

/// A location source whose watch always fails with permission denied.
struct DeniedSource;

impl LocationSource for DeniedSource {
    async fn watch(&self, _options: WatchOptions) -> Result<FixStream, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

// =============================================================================
// Reconnection policy
// =============================================================================

#[tokio::test]
async fn five_consecutive_connect_failures_end_the_retry_schedule() {
    let (tracker, handle, _store, _id) = setup_tracker().await;
    handle.fail_all_connects(true);

    tracker.connect().await;

    // The whole schedule at millisecond scale finishes well within this.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.connect_attempts(), 5);

    // No further attempt is ever scheduled.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.connect_attempts(), 5);
    assert!(!tracker.is_connected());
}

#[tokio::test]
async fn successful_connect_resets_the_failure_budget() {
    let (tracker, handle, _store, _id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();

    // Four failures consume most of the budget; the fifth attempt lands.
    handle.fail_next_connects(4);
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;
    assert_eq!(handle.connect_attempts(), 5);

    // Drop the transport; with the budget reset, another four failures
    // must still leave room to reconnect.
    handle.fail_next_connects(4);
    handle.drop_connection();
    wait_for_flag(&mut connection, false).await;
    wait_for_flag(&mut connection, true).await;
    assert_eq!(handle.connect_attempts(), 10);
}

// =============================================================================
// Emergency alerts
// =============================================================================

#[tokio::test]
async fn emergency_alert_is_persisted_while_disconnected() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;

    let mut alerts = tracker.subscribe_alerts();
    let alert = tracker
        .send_emergency_alert(AlertKind::Medical, "frostbite, need descent support")
        .await;

    // Always written locally, whatever the connection state.
    let log = AlertLog::new(store.inner());
    assert_eq!(log.count(expedition_id).await.unwrap(), 1);

    // Local subscribers are notified even though nothing went out.
    let broadcasted = alerts.recv().await.unwrap();
    assert_eq!(broadcasted.id, alert.id);
    assert!(handle.published().is_empty());
}

#[tokio::test]
async fn emergency_alert_is_persisted_and_published_while_connected() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    let alert = tracker
        .send_emergency_alert(AlertKind::Avalanche, "slide across the couloir")
        .await;

    let log = AlertLog::new(store.inner());
    assert_eq!(log.count(expedition_id).await.unwrap(), 1);

    let published = handle.published();
    assert!(published.iter().any(|event| matches!(
        event,
        ClientEvent::EmergencyAlert { alert: sent } if sent.id == alert.id
    )));
}

#[tokio::test]
async fn emergency_alert_uses_the_latest_buffered_position() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;

    let mut positions = tracker.subscribe_positions();
    let source = ReplaySource::new(vec![fix(46.85, -121.76), fix(46.86, -121.77)]);
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");

    // Both samples land before the replay stream closes.
    positions.recv().await.unwrap();
    positions.recv().await.unwrap();

    let alert = tracker.send_emergency_alert(AlertKind::Fall, "leader fall").await;
    let position = alert.position.expect("Alert should carry a position");
    assert_eq!(position.lat, 46.86);
}

// =============================================================================
// Offline sync
// =============================================================================

#[tokio::test]
async fn sync_marks_records_synced_only_after_successful_emit() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;
    let queue = PositionQueue::new(store.inner());

    // Three samples recorded while offline.
    for i in 0..3 {
        let point = GpsPoint::from_fix(&fix(46.85 + f64::from(i) * 0.01, -121.76), Utc::now());
        queue.enqueue(expedition_id, &point).await.unwrap();
    }

    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    // A failing transport leaves every record unsynced.
    handle.fail_publishes(true);
    let report = tracker.sync_offline_data().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert_eq!(report.remaining, 3);
    assert_eq!(queue.unsynced(expedition_id).await.unwrap().len(), 3);

    // Once the transport accepts emits, every record is replayed and
    // flipped to synced.
    handle.fail_publishes(false);
    let report = tracker.sync_offline_data().await.unwrap();
    assert_eq!(report.replayed, 3);
    assert_eq!(report.remaining, 0);
    assert!(queue.unsynced(expedition_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_while_disconnected_replays_nothing() {
    let (tracker, _handle, store, expedition_id) = setup_tracker().await;
    let queue = PositionQueue::new(store.inner());
    let point = GpsPoint::from_fix(&fix(46.85, -121.76), Utc::now());
    queue.enqueue(expedition_id, &point).await.unwrap();

    let report = tracker.sync_offline_data().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert_eq!(report.remaining, 1);
}

// =============================================================================
// Location tracking
// =============================================================================

#[tokio::test]
async fn stop_tracking_twice_is_a_no_op() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;
    let source = ReplaySource::new(vec![fix(46.85, -121.76)]);
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");

    tracker.stop_tracking().await;
    tracker.stop_tracking().await;
}

#[tokio::test]
async fn watch_options_map_a_fix_into_a_calltime_stamped_point() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;
    let mut positions = tracker.subscribe_positions();

    let options = WatchOptions::new()
        .with_high_accuracy(true)
        .with_timeout(Duration::from_secs(10))
        .with_maximum_age(Duration::from_secs(1));
    let source = ReplaySource::new(vec![fix(46.85, -121.76)]);

    let before = Utc::now();
    tracker
        .start_tracking(&source, options)
        .await
        .expect("Failed to start tracking");

    let point = timeout(Duration::from_secs(5), positions.recv())
        .await
        .expect("Timed out waiting for position")
        .unwrap();

    assert_eq!(point.lat, 46.85);
    assert_eq!(point.lon, -121.76);
    assert_eq!(point.altitude_m, 3200.0);
    assert_eq!(point.accuracy_m, 10.0);
    // Stamped at sampling time, not with some recorded timestamp.
    assert!(point.timestamp >= before);
    assert!(point.timestamp <= Utc::now());
}

#[tokio::test]
async fn watch_errors_propagate_to_the_start_tracking_caller() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;

    let err = tracker
        .start_tracking(&DeniedSource, WatchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::Location(LocationError::PermissionDenied)
    ));

    let empty = ReplaySource::new(Vec::new());
    let err = tracker
        .start_tracking(&empty, WatchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::Location(LocationError::Unavailable)
    ));
}

#[tokio::test]
async fn samples_stay_queued_while_disconnected() {
    let (tracker, _handle, store, expedition_id) = setup_tracker().await;
    let mut positions = tracker.subscribe_positions();

    let source = ReplaySource::new(vec![fix(46.85, -121.76), fix(46.86, -121.77)]);
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");
    positions.recv().await.unwrap();
    positions.recv().await.unwrap();

    let queue = PositionQueue::new(store.inner());
    // The sampling task writes each record right before broadcasting, so
    // both rows are durable by now; poll briefly to be safe.
    for _ in 0..100 {
        if queue.unsynced_count(expedition_id).await.unwrap() == 2 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 2);
}

#[tokio::test]
async fn samples_are_published_and_marked_synced_while_connected() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    let source = ReplaySource::new(vec![fix(46.85, -121.76), fix(46.86, -121.77)]);
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");

    // Join + two position updates.
    for _ in 0..200 {
        if handle.published().len() >= 3 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    let published = handle.published();
    let position_updates = published
        .iter()
        .filter(|event| matches!(event, ClientEvent::PositionUpdate { .. }))
        .count();
    assert_eq!(position_updates, 2);

    let queue = PositionQueue::new(store.inner());
    for _ in 0..100 {
        if queue.unsynced_count(expedition_id).await.unwrap() == 0 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 0);
}

#[tokio::test]
async fn track_buffer_backs_the_latest_position_accessor() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;
    let mut positions = tracker.subscribe_positions();

    let source = ReplaySource::new(vec![fix(46.85, -121.76), fix(46.86, -121.77)]);
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");
    positions.recv().await.unwrap();
    positions.recv().await.unwrap();

    let latest = tracker.latest_position().await.expect("No latest position");
    assert_eq!(latest.lat, 46.86);
    assert_eq!(tracker.track().await.len(), 2);
}

// =============================================================================
// Health metrics
// =============================================================================

fn sample_health() -> expedition_types::HealthMetrics {
    expedition_types::HealthMetrics {
        heart_rate_bpm: 92.0,
        spo2_pct: 88.0,
        body_temp_c: 36.4,
        respiration_rpm: 22.0,
        recorded_at: Utc::now(),
    }
}

#[tokio::test]
async fn health_readings_stay_queued_while_disconnected() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;

    tracker.update_health_metrics(sample_health()).await;

    let queue = expedition_store::HealthQueue::new(store.inner());
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 1);
    assert!(handle.published().is_empty());

    // A later sync pass delivers the reading.
    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;
    let report = tracker.sync_offline_data().await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 0);
}

#[tokio::test]
async fn health_readings_publish_live_and_mark_synced_while_connected() {
    let (tracker, handle, store, expedition_id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    tracker.update_health_metrics(sample_health()).await;

    let queue = expedition_store::HealthQueue::new(store.inner());
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 0);
    assert!(handle.published().iter().any(|event| matches!(
        event,
        ClientEvent::HealthUpdate { metrics, .. } if metrics.heart_rate_bpm == 92.0
    )));
}

// =============================================================================
// Server pushes
// =============================================================================

#[tokio::test]
async fn server_pushes_reach_subscribers_and_the_snapshot_cache() {
    let (tracker, handle, _store, expedition_id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();
    let mut expeditions = tracker.subscribe_expeditions();
    let mut weather = tracker.subscribe_weather();

    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    let pushed = sample_expedition(expedition_id);
    assert!(
        handle
            .push_server_event(ServerEvent::ExpeditionUpdate {
                expedition: pushed.clone(),
            })
            .await
    );
    let received = timeout(Duration::from_secs(5), expeditions.recv())
        .await
        .expect("Timed out waiting for expedition update")
        .unwrap();
    assert_eq!(received.name, pushed.name);

    let report = WeatherReport {
        condition: SkyCondition::Storm,
        temperature_c: -18.0,
        wind_speed_mps: 22.0,
        wind_gust_mps: Some(31.0),
        visibility_m: 40.0,
        pressure_hpa: 688.0,
        updated_at: Utc::now(),
    };
    assert!(
        handle
            .push_server_event(ServerEvent::WeatherUpdate { report })
            .await
    );
    let received = timeout(Duration::from_secs(5), weather.recv())
        .await
        .expect("Timed out waiting for weather")
        .unwrap();
    assert_eq!(received.condition, SkyCondition::Storm);

    // The aggregate landed in the local snapshot cache too.
    let cached = tracker
        .cached_expedition()
        .await
        .unwrap()
        .expect("Snapshot missing");
    assert_eq!(cached.id, expedition_id);
}

#[tokio::test]
async fn disconnect_tears_down_watch_and_channel_together() {
    let (tracker, _handle, _store, _id) = setup_tracker().await;
    let mut connection = tracker.subscribe_connection();
    tracker.connect().await;
    wait_for_flag(&mut connection, true).await;

    let source = ReplaySource::new(vec![fix(46.85, -121.76)]).paced();
    tracker
        .start_tracking(&source, WatchOptions::new())
        .await
        .expect("Failed to start tracking");

    tracker.disconnect().await;
    assert!(!tracker.is_connected());

    // Idempotent teardown.
    tracker.disconnect().await;
}
