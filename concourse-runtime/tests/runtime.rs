//! The assembled runtime: tracking feeds calibration, calibration feeds
//! tracking and persistence

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use concourse_core::fusion::SubjectId;
use concourse_core::geometry::Position;
use concourse_core::routing::RouteRequest;
use concourse_runtime::{BeaconPersistence, ConcourseRuntime, RuntimeError, ServiceConfig, TokioClock};
use tokio::time::timeout;

use common::{at, eventually, id, readings_at, square_registry, survey, two_floor_plan, MemoryStore};

fn config() -> ServiceConfig {
    ServiceConfig::from_json(
        r#"{
            "tick_interval_ms": 100,
            "calibration_pass_interval_ms": 60000,
            "drift_check_interval_ms": 30000
        }"#,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_recalibrated_registry_reaches_tracking_and_store() {
    let store = Arc::new(MemoryStore::default());
    let runtime = ConcourseRuntime::new(
        config(),
        TokioClock::starting_at(1_000),
        square_registry(),
        two_floor_plan(),
        Some(store.clone() as Arc<dyn BeaconPersistence>),
    )
    .unwrap();
    runtime.start();

    let subject = SubjectId::new("phone-1");
    let mut positions = runtime.tracking().start_tracking(&subject).unwrap();

    let truth = Position::new(22.5, 1.5, 0.0);
    runtime
        .calibration()
        .record_candidates(&survey(&runtime.registry(), "se", truth, 1_000));
    let mut reports = runtime.calibration().reports();
    timeout(Duration::from_secs(120), reports.changed())
        .await
        .expect("scheduled pass")
        .unwrap();

    let registry = runtime.registry();
    assert!(registry.get(&id("se")).unwrap().position.distance_to(&truth) < 0.05);
    assert!(eventually(|| store.records().len() == 1).await);
    assert_eq!(runtime.persistence_stats().unwrap().failures.load(Ordering::Relaxed), 0);

    // ranges measured against the moved beacon now fuse to the right spot
    let target = Position::new(10.0, 10.0, 0.0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    for (beacon, rssi, distance) in readings_at(&registry, target) {
        runtime.tracking().ingest_beacon(&subject, &beacon, rssi, distance);
    }
    let fused = timeout(Duration::from_secs(5), async {
        loop {
            positions.changed().await.unwrap();
            if let Some(fused) = *positions.borrow() {
                return fused;
            }
        }
    })
    .await
    .unwrap();
    assert!(fused.location.position.horizontal_distance_to(&target) < 0.05);

    let route = runtime
        .routes()
        .compute_route(&RouteRequest::new(at(0.0, 0), at(40.0, 0)))
        .unwrap();
    assert_eq!(route.floor_changes, 0);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_before_spawning() {
    let mut config = config();
    config.sample_queue_capacity = 0;
    let result = ConcourseRuntime::new(
        config,
        TokioClock::starting_at(0),
        square_registry(),
        two_floor_plan(),
        None,
    );
    assert!(matches!(result, Err(RuntimeError::InvalidConfig(_))));
}
