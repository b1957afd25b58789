//! Position Fusion for Tracked Subjects
//!
//! ## Overview
//!
//! Beacon ranges are plentiful but noisy; visual-inertial poses are precise
//! but only sometimes available and only sometimes trustworthy. The fusion
//! engine combines both into one position per subject with a confidence that
//! says how much to believe it.
//!
//! ```text
//! beacon scans ──┐                       ┌─→ FusedPosition (per subject)
//!                ├─→ SubjectFusion::tick ─┤
//! poses (≥0.7) ──┘                       └─→ calibration samples
//! ```
//!
//! ## Tick Algorithm
//!
//! 1. Drop observations older than `beacon_max_age` (5 s)
//! 2. Resolve the believed floor: a fresh or recently trusted pose decides;
//!    otherwise the floor most live beacons are on
//! 3. If the pose floor and a real beacon majority (≥ 3) disagree, the floor is
//!    ambiguous: hold position, confidence drops to the minimum
//! 4. With ≥ 3 live beacons on the believed floor, multilaterate
//! 5. Blend in a fresh trusted pose per axis: `α·pose + (1−α)·previous`
//! 6. With neither, hold the last position while confidence decays from the
//!    last evidence-backed emission
//!
//! Untrusted poses (confidence < 0.7) are ignored entirely at ingest.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use concourse_core::beacon::{BeaconId, BeaconRecord, BeaconRegistry, SignalType};
//! use concourse_core::fusion::{FusionConfig, PositionFusionEngine, SubjectId};
//! use concourse_core::geometry::{FloorId, Position};
//! use concourse_core::time::ManualClock;
//!
//! let mut registry = BeaconRegistry::new();
//! for (id, x, y) in [("a", 0.0, 0.0), ("b", 10.0, 0.0), ("c", 0.0, 10.0)] {
//!     registry.insert(BeaconRecord::new(
//!         BeaconId::parse(id).unwrap(),
//!         SignalType::ShortRange,
//!         Position::new(x, y, 0.0),
//!         FloorId(1),
//!     ));
//! }
//!
//! let clock = Arc::new(ManualClock::new(1_000));
//! let mut engine =
//!     PositionFusionEngine::new(clock.clone(), FusionConfig::default(), Arc::new(registry)).unwrap();
//!
//! let subject = SubjectId::from("phone-1");
//! engine.start_tracking(&subject);
//! engine.ingest_beacon(&subject, "a", -70.0, 5.0);
//! engine.ingest_beacon(&subject, "b", -70.0, 5.0);
//! engine.ingest_beacon(&subject, "c", -70.0, 5.0);
//!
//! let fused = engine.tick(&subject).unwrap();
//! assert_eq!(fused.location.floor, FloorId(1));
//! assert!((fused.confidence.as_float() - 0.6).abs() < 1e-3);
//! ```

pub mod confidence;
pub mod filter;
pub mod multilateration;
pub mod subject;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

pub use confidence::ConfidenceScore;
pub use filter::{GainMode, PositionFilter};
pub use subject::SubjectFusion;

use crate::beacon::{BeaconId, BeaconRegistry, BeaconScan, SignalType};
use crate::constants::fusion::{
    BEACON_MAX_AGE_MS, DEFAULT_BEACON_GAIN, DEFAULT_MOUNT_OFFSET_M, DEFAULT_POSE_BLEND,
    HOLD_CONFIDENCE_HALF_LIFE_MS, MIN_BEACONS_FOR_FIX, POSE_FLOOR_MEMORY_MS, POSE_MAX_AGE_MS,
    POSE_ONLY_DECAY, POSE_TRUST_THRESHOLD, SAMPLE_MIN_CONFIDENCE,
};
use crate::errors::ConfigError;
use crate::feed::{Feed, FeedDrain};
use crate::geometry::{Location, Orientation, Position};
use crate::time::{TimeSource, Timestamp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a tracked subject (a passenger's device)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self(String::from(id))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual-inertial pose from the upstream tracker
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseEstimate {
    pub location: Location,
    pub orientation: Orientation,
    /// Tracker confidence in [0, 1]
    pub confidence: f32,
    pub timestamp: Timestamp,
}

/// Latest fused position of a subject
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FusedPosition {
    pub location: Location,
    pub confidence: ConfidenceScore,
    pub timestamp: Timestamp,
}

/// What the last tick had to work with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EvidenceState {
    /// Nothing emitted yet
    NoEvidence,
    /// Multilateration fix only
    Beacons,
    /// Trusted pose only
    PoseOnly,
    /// Fix and pose blended
    BeaconsAndPose,
    /// Holding the last position, confidence decaying
    Holding,
    /// Pose and beacon majority disagree on the floor
    FloorAmbiguous,
}

/// One input record for a subject's feed
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FusionInput {
    Beacon(BeaconScan),
    Pose(PoseEstimate),
}

/// Observation taken at a pose-anchored position, ready for calibration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleCandidate {
    pub beacon_id: BeaconId,
    pub signal_type: SignalType,
    /// Where the subject was when the beacon was heard
    pub position: Position,
    pub signal_strength: f64,
    pub distance: f64,
    pub timestamp: Timestamp,
}

/// Fusion tuning
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FusionConfig {
    /// Observations older than this are discarded (ms)
    pub beacon_max_age_ms: u64,
    /// Live beacons on the believed floor needed for a fix
    pub min_beacons_for_fix: usize,
    /// Poses below this confidence are ignored
    pub pose_trust_threshold: f32,
    /// Poses older than this at tick time are ignored (ms)
    pub pose_max_age_ms: u64,
    /// How poses are blended into the estimate
    pub gain_mode: GainMode,
    /// Gain applied to a beacon fix (1.0 replaces the estimate)
    pub beacon_gain: f64,
    /// Confidence half-life while holding (ms)
    pub hold_half_life_ms: u64,
    /// How long a trusted pose keeps deciding the floor (ms)
    pub pose_floor_memory_ms: u64,
    /// Beacon height above the device (m)
    pub mount_offset: f64,
    /// Confidence factor per pose-only tick, at most 1.0
    pub pose_only_decay: f32,
    /// Minimum confidence for emitting calibration samples
    pub sample_min_confidence: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            beacon_max_age_ms: BEACON_MAX_AGE_MS,
            min_beacons_for_fix: MIN_BEACONS_FOR_FIX,
            pose_trust_threshold: POSE_TRUST_THRESHOLD,
            pose_max_age_ms: POSE_MAX_AGE_MS,
            gain_mode: GainMode::Fixed { alpha: DEFAULT_POSE_BLEND },
            beacon_gain: DEFAULT_BEACON_GAIN,
            hold_half_life_ms: HOLD_CONFIDENCE_HALF_LIFE_MS,
            pose_floor_memory_ms: POSE_FLOOR_MEMORY_MS,
            mount_offset: DEFAULT_MOUNT_OFFSET_M,
            pose_only_decay: POSE_ONLY_DECAY,
            sample_min_confidence: SAMPLE_MIN_CONFIDENCE,
        }
    }
}

impl FusionConfig {
    pub fn with_beacon_max_age(mut self, ms: u64) -> Self {
        self.beacon_max_age_ms = ms;
        self
    }

    pub fn with_gain_mode(mut self, mode: GainMode) -> Self {
        self.gain_mode = mode;
        self
    }

    pub fn with_beacon_gain(mut self, gain: f64) -> Self {
        self.beacon_gain = gain;
        self
    }

    pub fn with_hold_half_life(mut self, ms: u64) -> Self {
        self.hold_half_life_ms = ms;
        self
    }

    pub fn with_mount_offset(mut self, metres: f64) -> Self {
        self.mount_offset = metres;
        self
    }

    pub fn with_pose_floor_memory(mut self, ms: u64) -> Self {
        self.pose_floor_memory_ms = ms;
        self
    }

    /// Checks every parameter range
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_nonzero("beacon_max_age_ms", self.beacon_max_age_ms)?;
        ConfigError::check_nonzero("hold_half_life_ms", self.hold_half_life_ms)?;
        ConfigError::check_range("min_beacons_for_fix", self.min_beacons_for_fix as f64, 3.0, 32.0)?;
        ConfigError::check_range("pose_trust_threshold", f64::from(self.pose_trust_threshold), 0.0, 1.0)?;
        ConfigError::check_range("pose_only_decay", f64::from(self.pose_only_decay), 0.0, 1.0)?;
        ConfigError::check_range("sample_min_confidence", f64::from(self.sample_min_confidence), 0.0, 1.0)?;
        ConfigError::check_range("beacon_gain", self.beacon_gain, 0.01, 1.0)?;
        ConfigError::check_range("mount_offset", self.mount_offset, -10.0, 10.0)?;
        match self.gain_mode {
            GainMode::Fixed { alpha } => ConfigError::check_range("alpha", alpha, 0.01, 1.0),
            GainMode::Adaptive { process_noise, pose_variance } => {
                ConfigError::check_range("process_noise", process_noise, 0.0, 100.0)?;
                ConfigError::check_range("pose_variance", pose_variance, 1e-6, 100.0)
            }
        }
    }
}

/// Fuses beacon ranges and poses for every tracked subject
pub struct PositionFusionEngine<C: TimeSource> {
    clock: C,
    config: FusionConfig,
    registry: Arc<BeaconRegistry>,
    subjects: BTreeMap<SubjectId, SubjectFusion>,
}

impl<C: TimeSource> PositionFusionEngine<C> {
    pub fn new(clock: C, config: FusionConfig, registry: Arc<BeaconRegistry>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clock,
            config,
            registry,
            subjects: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BeaconRegistry> {
        &self.registry
    }

    /// Swaps in a newer registry snapshot (after recalibration)
    pub fn set_registry(&mut self, registry: Arc<BeaconRegistry>) {
        self.registry = registry;
    }

    /// Starts tracking a subject; `false` if already tracked
    pub fn start_tracking(&mut self, subject: &SubjectId) -> bool {
        if self.subjects.contains_key(subject) {
            return false;
        }
        log_info!("tracking started for {}", subject);
        self.subjects.insert(subject.clone(), SubjectFusion::new(self.config));
        true
    }

    /// Stops tracking and drops the subject's state; `false` if unknown
    pub fn stop_tracking(&mut self, subject: &SubjectId) -> bool {
        let removed = self.subjects.remove(subject).is_some();
        if removed {
            log_info!("tracking stopped for {}", subject);
        }
        removed
    }

    pub fn is_tracking(&self, subject: &SubjectId) -> bool {
        self.subjects.contains_key(subject)
    }

    pub fn tracked_subjects(&self) -> impl Iterator<Item = &SubjectId> {
        self.subjects.keys()
    }

    /// Records a beacon range; invalid input is dropped
    pub fn ingest_beacon(&mut self, subject: &SubjectId, beacon_id: &str, signal_strength: f64, distance: f64) {
        let now = self.clock.now();
        match self.subjects.get_mut(subject) {
            Some(state) => state.ingest_beacon(now, &self.registry, beacon_id, signal_strength, distance),
            None => log_debug!("beacon for untracked subject {} dropped", subject),
        }
    }

    /// Queues a pose; poses below the trust threshold are ignored entirely
    pub fn ingest_pose(&mut self, subject: &SubjectId, pose: PoseEstimate) {
        match self.subjects.get_mut(subject) {
            Some(state) => state.ingest_pose(pose),
            None => log_debug!("pose for untracked subject {} dropped", subject),
        }
    }

    /// Pulls every ready record from a feed into a subject
    ///
    /// The feed is left untouched for an untracked subject.
    pub fn drain_feed<F>(&mut self, subject: &SubjectId, feed: &mut F) -> FeedDrain
    where
        F: Feed<Item = FusionInput>,
    {
        match self.subjects.get_mut(subject) {
            Some(state) => state.drain_feed(feed, &self.clock, &self.registry),
            None => {
                log_debug!("feed for untracked subject {} not drained", subject);
                FeedDrain::default()
            }
        }
    }

    /// Recomputes a subject's position; `None` before any evidence
    pub fn tick(&mut self, subject: &SubjectId) -> Option<FusedPosition> {
        let now = self.clock.now();
        let state = self.subjects.get_mut(subject)?;
        state.tick(now, &self.registry)
    }

    /// Last emitted position, without recomputing
    pub fn current_position(&self, subject: &SubjectId) -> Option<FusedPosition> {
        self.subjects.get(subject)?.last().copied()
    }

    pub fn evidence_state(&self, subject: &SubjectId) -> Option<EvidenceState> {
        self.subjects.get(subject).map(SubjectFusion::state)
    }

    pub fn live_observation_count(&self, subject: &SubjectId) -> usize {
        self.subjects
            .get(subject)
            .map_or(0, SubjectFusion::live_observation_count)
    }

    /// Observations made at a trusted, pose-anchored position since the last call
    pub fn take_calibration_samples(&mut self, subject: &SubjectId) -> Vec<SampleCandidate> {
        match self.subjects.get_mut(subject) {
            Some(state) => state.take_calibration_samples(&self.registry),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::BeaconRecord;
    use crate::geometry::FloorId;
    use crate::time::ManualClock;

    fn registry() -> Arc<BeaconRegistry> {
        let mut registry = BeaconRegistry::new();
        let layout = [
            ("b1", 0.0, 0.0, 1),
            ("b2", 20.0, 0.0, 1),
            ("b3", 0.0, 20.0, 1),
            ("b4", 20.0, 20.0, 1),
            ("b5", 10.0, -5.0, 1),
            ("u1", 0.0, 0.0, 2),
            ("u2", 20.0, 0.0, 2),
            ("u3", 0.0, 20.0, 2),
        ];
        for (id, x, y, floor) in layout {
            registry.insert(BeaconRecord::new(
                BeaconId::parse(id).unwrap(),
                SignalType::ShortRange,
                Position::new(x, y, 0.0),
                FloorId(floor),
            ));
        }
        Arc::new(registry)
    }

    fn engine() -> (Arc<ManualClock>, PositionFusionEngine<Arc<ManualClock>>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let engine = PositionFusionEngine::new(clock.clone(), FusionConfig::default(), registry()).unwrap();
        (clock, engine)
    }

    fn range_to(engine: &PositionFusionEngine<Arc<ManualClock>>, id: &str, target: Position) -> f64 {
        let id = BeaconId::parse(id).unwrap();
        engine.registry().get(&id).unwrap().position.distance_to(&target)
    }

    fn pose(x: f64, y: f64, floor: i16, confidence: f32, timestamp: Timestamp) -> PoseEstimate {
        PoseEstimate {
            location: Location::new(Position::new(x, y, 0.0), FloorId(floor)),
            orientation: Orientation::default(),
            confidence,
            timestamp,
        }
    }

    #[test]
    fn no_evidence_no_position() {
        let (_, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        assert!(engine.tick(&subject).is_none());
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::NoEvidence));
    }

    #[test]
    fn five_beacons_full_confidence() {
        let (_, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        let target = Position::new(7.0, 9.0, 0.0);
        for id in ["b1", "b2", "b3", "b4", "b5"] {
            let d = range_to(&engine, id, target);
            engine.ingest_beacon(&subject, id, -65.0, d);
        }

        let fused = engine.tick(&subject).unwrap();
        assert_eq!(fused.confidence, ConfidenceScore::MAX_CONFIDENCE);
        assert_eq!(fused.location.floor, FloorId(1));
        assert!(fused.location.position.horizontal_distance_to(&target) < 1e-6);
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::Beacons));
    }

    #[test]
    fn invalid_readings_are_dropped() {
        let (_, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        engine.ingest_beacon(&subject, "not valid!", -60.0, 3.0);
        engine.ingest_beacon(&subject, "ghost", -60.0, 3.0);
        engine.ingest_beacon(&subject, "b1", -60.0, f64::NAN);
        engine.ingest_beacon(&subject, "b1", -60.0, 0.0);
        engine.ingest_beacon(&subject, "b1", -60.0, -2.0);
        assert_eq!(engine.live_observation_count(&subject), 0);

        engine.ingest_beacon(&subject, "b1", -60.0, 3.0);
        assert_eq!(engine.live_observation_count(&subject), 1);
    }

    #[test]
    fn untrusted_pose_ignored() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        engine.ingest_pose(&subject, pose(5.0, 5.0, 1, 0.69, clock.now()));
        assert!(engine.tick(&subject).is_none());

        engine.ingest_pose(&subject, pose(5.0, 5.0, 1, 0.7, clock.now()));
        let fused = engine.tick(&subject).unwrap();
        assert_eq!(fused.location.position, Position::new(5.0, 5.0, 0.0));
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::PoseOnly));
    }

    #[test]
    fn stale_pose_ignored() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        engine.ingest_pose(&subject, pose(5.0, 5.0, 1, 0.9, clock.now()));
        clock.advance(POSE_MAX_AGE_MS + 1);
        assert!(engine.tick(&subject).is_none());
    }

    #[test]
    fn pose_blends_with_beacon_fix() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        let target = Position::new(10.0, 10.0, 0.0);
        for id in ["b1", "b2", "b3"] {
            let d = range_to(&engine, id, target);
            engine.ingest_beacon(&subject, id, -65.0, d);
        }
        engine.ingest_pose(&subject, pose(12.0, 10.0, 1, 0.9, clock.now()));

        let fused = engine.tick(&subject).unwrap();
        // 0.7·12 + 0.3·10
        assert!((fused.location.position.x - 11.4).abs() < 1e-6);
        assert!((fused.location.position.y - 10.0).abs() < 1e-6);
        assert!((fused.confidence.as_float() - 0.9).abs() < 1e-3);
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::BeaconsAndPose));
    }

    #[test]
    fn pose_only_confidence_never_improves() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        let mut previous = 1.0f32;
        for step in 0..5 {
            clock.advance(100);
            engine.ingest_pose(&subject, pose(step as f64, 0.0, 1, 1.0, clock.now()));
            let fused = engine.tick(&subject).unwrap();
            assert!(fused.confidence.as_float() <= previous);
            previous = fused.confidence.as_float();
        }
    }

    #[test]
    fn held_confidence_decays_without_collapsing() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        engine.ingest_pose(&subject, pose(5.0, 5.0, 1, 0.9, clock.now()));
        let first = engine.tick(&subject).unwrap();

        // Same pose, still fresh
        clock.advance(100);
        let second = engine.tick(&subject).unwrap();
        assert!(second.confidence > ConfidenceScore::ZERO);
        assert!(second.confidence <= first.confidence);
        assert!(second.location.position.horizontal_distance_to(&first.location.position) < 1e-9);

        clock.advance(POSE_MAX_AGE_MS);
        let held = engine.tick(&subject).unwrap();
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::Holding));
        assert!(held.confidence > ConfidenceScore::ZERO);
        assert!(held.confidence <= second.confidence);
        assert_eq!(held.location, second.location);
    }

    #[test]
    fn floor_disagreement_is_ambiguous() {
        let (clock, mut engine) = engine();
        let subject = SubjectId::from("s");
        engine.start_tracking(&subject);

        let target = Position::new(5.0, 5.0, 0.0);
        for id in ["b1", "b2", "b3"] {
            let d = range_to(&engine, id, target);
            engine.ingest_beacon(&subject, id, -65.0, d);
        }
        let first = engine.tick(&subject).unwrap();

        clock.advance(100);
        engine.ingest_pose(&subject, pose(50.0, 50.0, 2, 0.95, clock.now()));
        let fused = engine.tick(&subject).unwrap();

        assert_eq!(fused.confidence, ConfidenceScore::MIN_CONFIDENCE);
        assert_eq!(fused.location, first.location);
        assert_eq!(engine.evidence_state(&subject), Some(EvidenceState::FloorAmbiguous));
    }

    #[test]
    fn stop_tracking_drops_state() {
        let (_, mut engine) = engine();
        let a = SubjectId::from("a");
        let b = SubjectId::from("b");
        engine.start_tracking(&a);
        engine.start_tracking(&b);
        assert!(!engine.start_tracking(&a));

        engine.ingest_beacon(&a, "b1", -60.0, 3.0);
        engine.ingest_beacon(&b, "b1", -60.0, 3.0);
        assert!(engine.stop_tracking(&a));

        assert_eq!(engine.live_observation_count(&a), 0);
        assert_eq!(engine.live_observation_count(&b), 1);
        assert!(engine.tick(&a).is_none());
        assert_eq!(engine.tracked_subjects().count(), 1);
    }

    #[test]
    fn config_validation() {
        assert!(FusionConfig::default().validate().is_ok());
        assert!(FusionConfig::default().with_beacon_gain(0.0).validate().is_err());
        assert!(FusionConfig::default()
            .with_gain_mode(GainMode::Fixed { alpha: 1.5 })
            .validate()
            .is_err());
    }
}
