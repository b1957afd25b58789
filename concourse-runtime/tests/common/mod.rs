//! Fixtures for the service tests
//!
//! - Four BLE beacons on L1 at the corners of a 20 m square
//! - A two-floor plan joined by stairs and a step-free lift
//! - An in-memory beacon store that can be told to fail

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use concourse_core::beacon::{BeaconId, BeaconRecord, BeaconRegistry, SignalType};
use concourse_core::fusion::SampleCandidate;
use concourse_core::geometry::{FloorId, Location, Position};
use concourse_core::routing::graph::{AccessibilityFeatures, FloorPlan, NodeKind, TransitionKind, TransitionSpec};
use concourse_core::time::Timestamp;
use concourse_runtime::{BeaconPersistence, RuntimeError, RuntimeResult};
use parking_lot::Mutex;

pub const L1: FloorId = FloorId(1);

pub fn id(raw: &str) -> BeaconId {
    BeaconId::parse(raw).unwrap()
}

pub const CORNERS: [(&str, f64, f64); 4] = [
    ("nw", 0.0, 20.0),
    ("ne", 20.0, 20.0),
    ("sw", 0.0, 0.0),
    ("se", 20.0, 0.0),
];

pub fn square_registry() -> BeaconRegistry {
    CORNERS
        .iter()
        .map(|&(raw, x, y)| BeaconRecord::new(id(raw), SignalType::ShortRange, Position::new(x, y, 0.0), L1))
        .collect()
}

/// Exact `(beacon, rssi, distance)` readings heard at `target`
pub fn readings_at(registry: &BeaconRegistry, target: Position) -> Vec<(String, f64, f64)> {
    registry
        .iter()
        .map(|r| {
            let distance = r.position.distance_to(&target);
            (r.beacon_id.as_str().to_string(), r.path_loss.rssi_at(distance), distance)
        })
        .collect()
}

const SPOTS: [(f64, f64); 12] = [
    (3.0, 4.0),
    (8.0, 4.0),
    (13.0, 4.0),
    (17.0, 4.0),
    (3.0, 10.0),
    (8.0, 10.0),
    (13.0, 10.0),
    (17.0, 10.0),
    (3.0, 16.0),
    (8.0, 16.0),
    (13.0, 16.0),
    (17.0, 16.0),
];

/// Calibration samples for `beacon` as heard from its true position
pub fn survey(registry: &BeaconRegistry, beacon: &str, truth: Position, timestamp: Timestamp) -> Vec<SampleCandidate> {
    let record = registry.get(&id(beacon)).unwrap();
    SPOTS
        .iter()
        .map(|&(x, y)| {
            let spot = Position::new(x, y, 0.0);
            let distance = spot.distance_to(&truth);
            SampleCandidate {
                beacon_id: record.beacon_id.clone(),
                signal_type: SignalType::ShortRange,
                position: spot,
                signal_strength: record.path_loss.rssi_at(distance),
                distance,
                timestamp,
            }
        })
        .collect()
}

pub fn at(x: f64, floor: i16) -> Location {
    Location::new(Position::new(x, 0.0, 0.0), FloorId(floor))
}

/// ```text
/// L1  u0 ── u1 ── u2
///      │ stairs    ║ lift (step-free)
/// L0  g0 ── g1 ── g2
/// ```
pub fn two_floor_plan() -> FloorPlan {
    let mut builder = FloorPlan::builder();
    let g: Vec<_> = (0..3)
        .map(|i| builder.add_node(format!("g{}", i), at(i as f64 * 20.0, 0), NodeKind::Waypoint))
        .collect();
    let u: Vec<_> = (0..3)
        .map(|i| builder.add_node(format!("u{}", i), at(i as f64 * 20.0, 1), NodeKind::Waypoint))
        .collect();
    builder.connect_path(&g).unwrap();
    builder.connect_path(&u).unwrap();
    builder
        .add_transition(TransitionSpec::new("stairs", TransitionKind::Stairs, g[0], u[0]))
        .unwrap();
    builder
        .add_transition(
            TransitionSpec::new("lift", TransitionKind::Elevator, g[2], u[2])
                .with_accessibility(AccessibilityFeatures::step_free()),
        )
        .unwrap();
    builder.build()
}

/// Beacon store backed by a vector
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<BeaconRecord>>,
    failures_left: AtomicUsize,
}

impl MemoryStore {
    /// Rejects the next `count` writes
    pub fn failing(count: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(count),
        }
    }

    pub fn records(&self) -> Vec<BeaconRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl BeaconPersistence for MemoryStore {
    async fn save_beacon(&self, record: &BeaconRecord) -> RuntimeResult<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RuntimeError::Persistence(format!("{} rejected", record.beacon_id)));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Polls `done` under paused time until it holds, for at most a minute
pub async fn eventually(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..600 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    done()
}
