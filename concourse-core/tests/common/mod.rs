//! Shared fixtures for integration tests
//!
//! - A small concourse: four BLE beacons on L1 at the corners of a 20 m
//!   square and three on L2
//! - Exact range and pose helpers
//! - A three-floor terminal plan with stairs, a one-way escalator and a
//!   step-free elevator
//! - A deterministic xorshift generator for noise

#![allow(dead_code)]

use std::sync::Arc;

use concourse_core::beacon::{BeaconId, BeaconRecord, BeaconRegistry, SignalType};
use concourse_core::fusion::PoseEstimate;
use concourse_core::geometry::{FloorId, Location, Orientation, Position};
use concourse_core::routing::graph::{
    AccessibilityFeatures, FloorPlan, NodeIndex, NodeKind, TransitionKind, TransitionSpec,
};
use concourse_core::time::Timestamp;

pub const L1: FloorId = FloorId(1);
pub const L2: FloorId = FloorId(2);

pub fn id(raw: &str) -> BeaconId {
    BeaconId::parse(raw).unwrap()
}

/// Beacon layout: `(id, x, y, floor)`
pub const LAYOUT: [(&str, f64, f64, FloorId); 7] = [
    ("l1-nw", 0.0, 20.0, L1),
    ("l1-ne", 20.0, 20.0, L1),
    ("l1-sw", 0.0, 0.0, L1),
    ("l1-se", 20.0, 0.0, L1),
    ("l2-a", 0.0, 0.0, L2),
    ("l2-b", 20.0, 0.0, L2),
    ("l2-c", 10.0, 20.0, L2),
];

pub fn concourse_registry() -> BeaconRegistry {
    LAYOUT
        .iter()
        .map(|&(raw, x, y, floor)| {
            BeaconRecord::new(id(raw), SignalType::ShortRange, Position::new(x, y, 0.0), floor)
        })
        .collect()
}

pub fn shared_registry() -> Arc<BeaconRegistry> {
    Arc::new(concourse_registry())
}

/// Exact ranges from every beacon on `floor` to `target`
pub fn ranges_on(registry: &BeaconRegistry, floor: FloorId, target: Position) -> Vec<(String, f64)> {
    registry
        .iter()
        .filter(|r| r.floor == floor)
        .map(|r| (r.beacon_id.as_str().to_string(), r.position.distance_to(&target)))
        .collect()
}

pub fn pose(x: f64, y: f64, floor: FloorId, confidence: f32, timestamp: Timestamp) -> PoseEstimate {
    PoseEstimate {
        location: Location::new(Position::new(x, y, 0.0), floor),
        orientation: Orientation::default(),
        confidence,
        timestamp,
    }
}

pub fn at(x: f64, floor: i16) -> Location {
    Location::new(Position::new(x, 0.0, 0.0), FloorId(floor))
}

/// Node handles of [`terminal_plan`]
pub struct Terminal {
    pub plan: FloorPlan,
    pub ground: [NodeIndex; 4],
    pub mezzanine: [NodeIndex; 4],
    pub departures: [NodeIndex; 4],
}

/// Three corridors (x = 0, 20, 40, 60) on L0, L1 and L2
///
/// ```text
/// L2  t0 ── t1 ────────────── t3
///            │ stairs-d        ║
/// L1  u0 ── u1 ── u2 ── u3     ║ lift-c (L0 ⇄ L2, step-free)
///            │ stairs-a ↑ esc-b ║
/// L0  g0 ── g1 ── g2 ── g3 ════╝
/// ```
pub fn terminal_plan() -> Terminal {
    let mut builder = FloorPlan::builder();
    let mut corridor = |prefix: &str, floor: i16| {
        let nodes: Vec<NodeIndex> = (0..4)
            .map(|i| builder.add_node(format!("{}{}", prefix, i), at(i as f64 * 20.0, floor), NodeKind::Waypoint))
            .collect();
        builder.connect_path(&nodes).unwrap();
        [nodes[0], nodes[1], nodes[2], nodes[3]]
    };
    let ground = corridor("g", 0);
    let mezzanine = corridor("u", 1);
    let departures = corridor("t", 2);

    builder
        .add_transition(TransitionSpec::new("stairs-a", TransitionKind::Stairs, ground[1], mezzanine[1]))
        .unwrap();
    builder
        .add_transition(
            TransitionSpec::new("escalator-b", TransitionKind::Escalator, ground[2], mezzanine[2]).one_way(),
        )
        .unwrap();
    builder
        .add_transition(
            TransitionSpec::new("lift-c", TransitionKind::Elevator, ground[3], departures[3])
                .with_accessibility(AccessibilityFeatures::step_free()),
        )
        .unwrap();
    builder
        .add_transition(TransitionSpec::new("stairs-d", TransitionKind::Stairs, mezzanine[1], departures[1]))
        .unwrap();

    Terminal {
        plan: builder.build(),
        ground,
        mezzanine,
        departures,
    }
}

/// Xorshift generator for reproducible noise
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32() >> 8) / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}
