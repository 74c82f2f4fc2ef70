//! Integration tests for the `expedition-store` data layer.
//!
//! All tests run against an in-memory `SQLite` database, so no external
//! services are required.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::float_cmp,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use chrono::Utc;

use expedition_store::{AlertLog, HealthQueue, PositionQueue, SnapshotStore, StorePool};
use expedition_types::{
    AlertKind, EmergencyAlert, Expedition, ExpeditionId, ExpeditionStatus, GpsPoint,
    HealthMetrics, LocationFix, ParticipantId,
};

// =============================================================================
// Helpers
// =============================================================================

async fn setup_store() -> StorePool {
    let pool = StorePool::in_memory()
        .await
        .expect("Failed to open in-memory store");
    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    pool
}

fn sample_point(lat: f64, lon: f64) -> GpsPoint {
    GpsPoint::from_fix(&LocationFix::new(lat, lon, 3200.0, 10.0), Utc::now())
}

fn sample_health() -> HealthMetrics {
    HealthMetrics {
        heart_rate_bpm: 92.0,
        spo2_pct: 88.0,
        body_temp_c: 36.4,
        respiration_rpm: 22.0,
        recorded_at: Utc::now(),
    }
}

fn sample_expedition(id: ExpeditionId) -> Expedition {
    Expedition {
        id,
        name: "Rainier North Face".to_owned(),
        status: ExpeditionStatus::Active,
        current_position: Some(sample_point(46.85, -121.76)),
        route: vec![sample_point(46.83, -121.73), sample_point(46.85, -121.76)],
        participants: Vec::new(),
        weather: None,
        started_at: Utc::now(),
        estimated_end: Utc::now(),
        actual_end: None,
    }
}

// =============================================================================
// Position queue
// =============================================================================

#[tokio::test]
async fn enqueued_positions_start_unsynced_in_insertion_order() {
    let pool = setup_store().await;
    let queue = PositionQueue::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    for i in 0..5 {
        let point = sample_point(46.85 + f64::from(i) * 0.001, -121.76);
        queue
            .enqueue(expedition_id, &point)
            .await
            .expect("Failed to enqueue");
    }

    let pending = queue.unsynced(expedition_id).await.expect("Failed to read");
    assert_eq!(pending.len(), 5);
    assert!(pending.iter().all(|p| !p.synced));
    // Insertion order: row ids strictly increase.
    for pair in pending.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
    assert_eq!(pending[0].point.lat, 46.85);
}

#[tokio::test]
async fn mark_synced_removes_record_from_pending_set() {
    let pool = setup_store().await;
    let queue = PositionQueue::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    let first = queue
        .enqueue(expedition_id, &sample_point(46.85, -121.76))
        .await
        .expect("Failed to enqueue");
    queue
        .enqueue(expedition_id, &sample_point(46.86, -121.77))
        .await
        .expect("Failed to enqueue");

    queue.mark_synced(first).await.expect("Failed to mark");

    let pending = queue.unsynced(expedition_id).await.expect("Failed to read");
    assert_eq!(pending.len(), 1);
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 1);
}

#[tokio::test]
async fn mark_synced_on_missing_row_is_not_found() {
    let pool = setup_store().await;
    let queue = PositionQueue::new(pool.inner());

    let err = queue.mark_synced(9999).await.unwrap_err();
    assert!(matches!(err, expedition_store::StoreError::NotFound(_)));
}

#[tokio::test]
async fn purge_only_deletes_synced_rows() {
    let pool = setup_store().await;
    let queue = PositionQueue::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    let first = queue
        .enqueue(expedition_id, &sample_point(46.85, -121.76))
        .await
        .unwrap();
    queue
        .enqueue(expedition_id, &sample_point(46.86, -121.77))
        .await
        .unwrap();

    queue.mark_synced(first).await.unwrap();
    let purged = queue.purge_synced(expedition_id).await.unwrap();
    assert_eq!(purged, 1);

    // The unsynced record survives the purge.
    assert_eq!(queue.unsynced_count(expedition_id).await.unwrap(), 1);
}

#[tokio::test]
async fn queues_are_scoped_per_expedition() {
    let pool = setup_store().await;
    let queue = PositionQueue::new(pool.inner());
    let ours = ExpeditionId::new();
    let theirs = ExpeditionId::new();

    queue.enqueue(ours, &sample_point(46.85, -121.76)).await.unwrap();
    queue.enqueue(theirs, &sample_point(27.98, 86.92)).await.unwrap();

    assert_eq!(queue.unsynced_count(ours).await.unwrap(), 1);
    assert_eq!(queue.unsynced_count(theirs).await.unwrap(), 1);
}

// =============================================================================
// Health queue
// =============================================================================

#[tokio::test]
async fn health_readings_round_trip_through_the_queue() {
    let pool = setup_store().await;
    let queue = HealthQueue::new(pool.inner());
    let expedition_id = ExpeditionId::new();
    let participant_id = ParticipantId::new();
    let metrics = sample_health();

    let id = queue
        .enqueue(expedition_id, participant_id, &metrics)
        .await
        .expect("Failed to enqueue");

    let pending = queue.unsynced(expedition_id).await.expect("Failed to read");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].participant_id, participant_id);
    assert_eq!(pending[0].metrics.heart_rate_bpm, 92.0);

    queue.mark_synced(id).await.expect("Failed to mark");
    assert!(queue.unsynced(expedition_id).await.unwrap().is_empty());
}

// =============================================================================
// Snapshot store
// =============================================================================

#[tokio::test]
async fn snapshot_put_then_get_returns_the_aggregate() {
    let pool = setup_store().await;
    let store = SnapshotStore::new(pool.inner());
    let expedition_id = ExpeditionId::new();
    let expedition = sample_expedition(expedition_id);

    store.put(&expedition).await.expect("Failed to cache");
    let cached = store
        .get(expedition_id)
        .await
        .expect("Failed to load")
        .expect("Snapshot missing");
    assert_eq!(cached, expedition);
}

#[tokio::test]
async fn snapshot_put_overwrites_previous_copy() {
    let pool = setup_store().await;
    let store = SnapshotStore::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    let mut expedition = sample_expedition(expedition_id);
    store.put(&expedition).await.unwrap();

    expedition.status = ExpeditionStatus::Paused;
    store.put(&expedition).await.unwrap();

    let cached = store.get(expedition_id).await.unwrap().unwrap();
    assert_eq!(cached.status, ExpeditionStatus::Paused);
}

#[tokio::test]
async fn snapshot_get_for_unknown_expedition_is_none() {
    let pool = setup_store().await;
    let store = SnapshotStore::new(pool.inner());
    assert!(store.get(ExpeditionId::new()).await.unwrap().is_none());
}

// =============================================================================
// Alert log
// =============================================================================

#[tokio::test]
async fn alerts_are_recorded_and_listed_newest_first() {
    let pool = setup_store().await;
    let log = AlertLog::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    let first = EmergencyAlert::raise(expedition_id, AlertKind::Weather, "storm closing in", None);
    let second = EmergencyAlert::raise(
        expedition_id,
        AlertKind::Medical,
        "frostbite, need descent support",
        Some(sample_point(46.85, -121.76)),
    );

    log.record(&first).await.expect("Failed to record");
    log.record(&second).await.expect("Failed to record");

    assert_eq!(log.count(expedition_id).await.unwrap(), 2);
    let recent = log.recent(expedition_id, 10).await.expect("Failed to list");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
}

#[tokio::test]
async fn recording_the_same_alert_twice_is_idempotent() {
    let pool = setup_store().await;
    let log = AlertLog::new(pool.inner());
    let expedition_id = ExpeditionId::new();

    let alert = EmergencyAlert::raise(expedition_id, AlertKind::Sos, "need assistance", None);
    log.record(&alert).await.unwrap();
    log.record(&alert).await.unwrap();

    assert_eq!(log.count(expedition_id).await.unwrap(), 1);
}
