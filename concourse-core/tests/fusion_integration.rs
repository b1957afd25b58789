//! Integration tests for beacon/pose position fusion
//!
//! Covers:
//! - Multilateration accuracy and beacon-count confidence
//! - Holding with confidence decaying from the last evidence
//! - Floor ambiguity and floor changes driven by trusted poses
//! - Pose-only confidence never increasing
//! - Feed draining and calibration sample hand-off

mod common;

use std::sync::Arc;

use concourse_core::beacon::BeaconScan;
use concourse_core::feed::MemoryFeed;
use concourse_core::fusion::{
    ConfidenceScore, EvidenceState, FusionConfig, FusionInput, GainMode, PositionFusionEngine, SubjectId,
};
use concourse_core::geometry::Position;
use concourse_core::time::{ManualClock, TimeSource};

use common::{pose, ranges_on, shared_registry, L1, L2};
use proptest::prelude::*;

fn engine(config: FusionConfig) -> (Arc<ManualClock>, PositionFusionEngine<Arc<ManualClock>>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let engine = PositionFusionEngine::new(clock.clone(), config, shared_registry()).unwrap();
    (clock, engine)
}

fn ingest_exact(engine: &mut PositionFusionEngine<Arc<ManualClock>>, subject: &SubjectId, target: Position) {
    let registry = engine.registry().clone();
    for (beacon, distance) in ranges_on(&registry, L1, target) {
        engine.ingest_beacon(subject, &beacon, -70.0, distance);
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_exact_ranges_locate_subject() {
    let (_clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    ingest_exact(&mut engine, &subject, Position::new(7.0, 12.0, 0.0));
    let fused = engine.tick(&subject).unwrap();

    assert_eq!(fused.location.floor, L1);
    assert!((fused.location.position.x - 7.0).abs() < 1e-6);
    assert!((fused.location.position.y - 12.0).abs() < 1e-6);
    // Four beacons: min(1, 4/5)
    assert!(close(fused.confidence.as_float(), 0.8));
    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::Beacons));
}

#[test]
fn test_no_evidence_means_no_position() {
    let (_clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    // Two beacons are not a fix and there is nothing to hold
    engine.ingest_beacon(&subject, "l1-sw", -70.0, 5.0);
    engine.ingest_beacon(&subject, "l1-se", -70.0, 5.0);
    assert!(engine.tick(&subject).is_none());
    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::NoEvidence));

    // Unknown subjects never produce positions
    assert!(engine.tick(&SubjectId::from("ghost")).is_none());
}

#[test]
fn test_hold_decays_from_last_evidence() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    ingest_exact(&mut engine, &subject, Position::new(7.0, 12.0, 0.0));
    let fix = engine.tick(&subject).unwrap();

    // Original ranges expire; only two beacons heard again
    clock.advance(6_000);
    engine.ingest_beacon(&subject, "l1-nw", -70.0, 10.0);
    engine.ingest_beacon(&subject, "l1-ne", -70.0, 10.0);
    let held = engine.tick(&subject).unwrap();

    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::Holding));
    assert_eq!(held.location, fix.location);
    // 0.8 · 2^-0.6
    assert!(close(held.confidence.as_float(), 0.5278));

    clock.advance(14_000);
    engine.ingest_beacon(&subject, "l1-nw", -70.0, 10.0);
    engine.ingest_beacon(&subject, "l1-ne", -70.0, 10.0);
    let later = engine.tick(&subject).unwrap();

    // Two half-lives since the fix
    assert!(close(later.confidence.as_float(), 0.2));
    assert!(later.confidence <= held.confidence);
    assert_eq!(later.location, fix.location);
}

#[test]
fn test_hold_without_beacons_keeps_decaying() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    ingest_exact(&mut engine, &subject, Position::new(10.0, 10.0, 0.0));
    let fix = engine.tick(&subject).unwrap();

    clock.advance(100);
    let first = engine.tick(&subject).unwrap();
    assert!(first.confidence > ConfidenceScore::ZERO);
    assert!(first.confidence <= fix.confidence);

    clock.advance(59_900);
    let held = engine.tick(&subject).unwrap();
    assert_eq!(engine.live_observation_count(&subject), 0);
    assert_eq!(held.location, fix.location);
    // 0.8 · 2^-6
    assert!(close(held.confidence.as_float(), 0.0125));
    assert!(held.confidence > ConfidenceScore::ZERO);
}

#[test]
fn test_slow_pose_stream_never_gains_confidence() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    // A pose every third tick; the ticks between reuse it
    let mut previous = ConfidenceScore::MAX_CONFIDENCE;
    for step in 0..30 {
        if step % 3 == 0 {
            engine.ingest_pose(&subject, pose(2.0, 2.0, L1, 0.9, clock.now()));
        }
        let fused = engine.tick(&subject).unwrap();
        assert!(fused.confidence > ConfidenceScore::ZERO);
        assert!(fused.confidence <= previous);
        previous = fused.confidence;
        clock.advance(100);
    }
    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::PoseOnly));
}

#[test]
fn test_floor_ambiguity_holds_at_minimum_confidence() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    ingest_exact(&mut engine, &subject, Position::new(5.0, 5.0, 0.0));
    let fix = engine.tick(&subject).unwrap();

    clock.advance(500);
    ingest_exact(&mut engine, &subject, Position::new(5.0, 5.0, 0.0));
    engine.ingest_pose(&subject, pose(5.0, 5.0, L2, 0.95, clock.now()));
    let ambiguous = engine.tick(&subject).unwrap();

    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::FloorAmbiguous));
    assert_eq!(ambiguous.confidence, ConfidenceScore::MIN_CONFIDENCE);
    assert_eq!(ambiguous.location, fix.location);
}

#[test]
fn test_trusted_pose_outvotes_weak_beacon_majority() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    // Two L1 beacons bleed through the floor; the pose says L2
    engine.ingest_beacon(&subject, "l1-sw", -80.0, 9.0);
    engine.ingest_beacon(&subject, "l1-se", -80.0, 9.0);
    engine.ingest_pose(&subject, pose(4.0, 3.0, L2, 0.9, clock.now()));

    let fused = engine.tick(&subject).unwrap();
    assert_eq!(fused.location.floor, L2);
    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::PoseOnly));
    assert!((fused.location.position.x - 4.0).abs() < 1e-9);
}

#[test]
fn test_untrusted_pose_ignored() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    engine.ingest_pose(&subject, pose(4.0, 3.0, L1, 0.5, clock.now()));
    assert!(engine.tick(&subject).is_none());
}

#[test]
fn test_stale_pose_ignored() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    engine.ingest_pose(&subject, pose(4.0, 3.0, L1, 0.9, clock.now()));
    clock.advance(2_000);
    assert!(engine.tick(&subject).is_none());
}

#[test]
fn test_pose_only_confidence_never_increases() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    engine.ingest_pose(&subject, pose(1.0, 1.0, L2, 0.9, clock.now()));
    let first = engine.tick(&subject).unwrap();
    assert!(close(first.confidence.as_float(), 0.9 * 0.95));

    let mut previous = first.confidence;
    for step in 1..6 {
        clock.advance(100);
        engine.ingest_pose(&subject, pose(1.0 + step as f64, 1.0, L2, 1.0, clock.now()));
        let fused = engine.tick(&subject).unwrap();
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::PoseOnly));
        assert!(fused.confidence <= previous);
        previous = fused.confidence;
    }
}

#[test]
fn test_pose_blends_into_beacon_fix() {
    let (clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    ingest_exact(&mut engine, &subject, Position::new(10.0, 10.0, 0.0));
    engine.ingest_pose(&subject, pose(12.0, 10.0, L1, 0.9, clock.now()));
    let fused = engine.tick(&subject).unwrap();

    assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::BeaconsAndPose));
    // 0.7 · 12 + 0.3 · 10
    assert!((fused.location.position.x - 11.4).abs() < 1e-6);
    assert!((fused.location.position.y - 10.0).abs() < 1e-6);
    assert!(close(fused.confidence.as_float(), 0.9));
}

#[test]
fn test_drain_feed_ingests_everything_ready() {
    let (_clock, mut engine) = engine(FusionConfig::default());
    let subject = SubjectId::from("pax-1");
    engine.start_tracking(&subject);

    let registry = engine.registry().clone();
    let inputs: Vec<FusionInput> = ranges_on(&registry, L1, Position::new(3.0, 15.0, 0.0))
        .into_iter()
        .map(|(beacon_id, distance)| {
            FusionInput::Beacon(BeaconScan {
                beacon_id,
                signal_strength: -72.0,
                distance,
            })
        })
        .collect();

    let mut feed = MemoryFeed::new(&inputs);
    let drained = engine.drain_feed(&subject, &mut feed);
    assert_eq!(drained.ingested, 4);
    assert_eq!(drained.malformed, 0);
    assert!(drained.closed);

    let fused = engine.tick(&subject).unwrap();
    assert!((fused.location.position.y - 15.0).abs() < 1e-6);
}

#[test]
fn test_calibration_samples_only_from_pose_anchored_positions() {
    let config = FusionConfig::default().with_gain_mode(GainMode::Fixed { alpha: 1.0 });
    let (clock, mut engine) = engine(config);
    let anchored = SubjectId::from("pax-anchored");
    let beacons_only = SubjectId::from("pax-beacons");
    engine.start_tracking(&anchored);
    engine.start_tracking(&beacons_only);

    let target = Position::new(6.0, 8.0, 0.0);
    ingest_exact(&mut engine, &anchored, target);
    ingest_exact(&mut engine, &beacons_only, target);
    engine.ingest_pose(&anchored, pose(6.0, 8.0, L1, 0.9, clock.now()));
    engine.tick(&anchored).unwrap();
    engine.tick(&beacons_only).unwrap();

    let samples = engine.take_calibration_samples(&anchored);
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s.position == target));

    // Already handed over
    assert!(engine.take_calibration_samples(&anchored).is_empty());
    // Beacon-derived positions would only confirm the beacons themselves
    assert!(engine.take_calibration_samples(&beacons_only).is_empty());
}

#[test]
fn test_subjects_are_isolated() {
    let (_clock, mut engine) = engine(FusionConfig::default());
    let a = SubjectId::from("pax-a");
    let b = SubjectId::from("pax-b");
    assert!(engine.start_tracking(&a));
    assert!(engine.start_tracking(&b));
    assert!(!engine.start_tracking(&a));

    ingest_exact(&mut engine, &a, Position::new(2.0, 2.0, 0.0));
    ingest_exact(&mut engine, &b, Position::new(18.0, 18.0, 0.0));
    engine.tick(&a).unwrap();
    let before = engine.tick(&b).unwrap();

    assert!(engine.stop_tracking(&a));
    assert!(!engine.is_tracking(&a));
    assert_eq!(engine.current_position(&b), Some(before));
    assert_eq!(engine.tracked_subjects().count(), 1);
}

proptest! {
    #[test]
    fn prop_exact_ranges_recover_position(x in 1.0f64..19.0, y in 1.0f64..19.0) {
        let (_clock, mut engine) = engine(FusionConfig::default());
        let subject = SubjectId::from("pax-prop");
        engine.start_tracking(&subject);

        ingest_exact(&mut engine, &subject, Position::new(x, y, 0.0));
        let fused = engine.tick(&subject).unwrap();

        prop_assert!((fused.location.position.x - x).abs() < 1e-6);
        prop_assert!((fused.location.position.y - y).abs() < 1e-6);
        prop_assert!(fused.confidence.as_float() <= 1.0);
    }

    #[test]
    fn prop_hold_confidence_never_exceeds_evidence(gap_ms in 0u64..120_000) {
        let (clock, mut engine) = engine(FusionConfig::default());
        let subject = SubjectId::from("pax-prop");
        engine.start_tracking(&subject);

        ingest_exact(&mut engine, &subject, Position::new(10.0, 5.0, 0.0));
        let fix = engine.tick(&subject).unwrap();

        clock.advance(gap_ms);
        let held = engine.tick(&subject).unwrap();
        prop_assert!(held.confidence <= fix.confidence);
        prop_assert_eq!(held.location, fix.location);
    }
}
