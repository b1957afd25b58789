//! Per-subject fusion state
//!
//! Each tracked subject owns its live observations, latest trusted pose,
//! filter and last emitted position. Nothing here is shared between
//! subjects, so one subject's state can be locked, ticked or dropped without
//! touching another's.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::confidence::ConfidenceScore;
use super::filter::PositionFilter;
use super::multilateration::{locate, RangeMeasurement};
use super::{EvidenceState, FusedPosition, FusionConfig, FusionInput, PoseEstimate, SampleCandidate};
use crate::beacon::{BeaconId, BeaconObservation, BeaconRegistry};
use crate::constants::fusion::MAX_LIVE_OBSERVATIONS;
use crate::errors::FeedError;
use crate::feed::{Feed, FeedDrain};
use crate::geometry::{FloorId, Location};
use crate::time::{elapsed_ms, TimeSource, Timestamp};

/// Fusion state for one tracked subject
#[derive(Debug, Clone)]
pub struct SubjectFusion {
    config: FusionConfig,
    observations: BTreeMap<BeaconId, BeaconObservation>,
    /// Newest trusted pose, used until it goes stale
    latest_pose: Option<PoseEstimate>,
    /// Floor of the last trusted pose and when it was applied
    trusted_floor: Option<(FloorId, Timestamp)>,
    filter: PositionFilter,
    filter_floor: Option<FloorId>,
    last: Option<FusedPosition>,
    state: EvidenceState,
    /// Confidence of the last evidence-backed emission
    evidence_confidence: ConfidenceScore,
    evidence_at: Timestamp,
    sampled_until: Timestamp,
}

impl SubjectFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            observations: BTreeMap::new(),
            latest_pose: None,
            trusted_floor: None,
            filter: PositionFilter::new(config.gain_mode),
            filter_floor: None,
            last: None,
            state: EvidenceState::NoEvidence,
            evidence_confidence: ConfidenceScore::ZERO,
            evidence_at: 0,
            sampled_until: 0,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Records a beacon range heard at `now`; invalid input is dropped
    pub fn ingest_beacon(
        &mut self,
        now: Timestamp,
        registry: &BeaconRegistry,
        beacon_id: &str,
        signal_strength: f64,
        distance: f64,
    ) {
        let id = match BeaconId::parse(beacon_id) {
            Some(id) => id,
            None => {
                log_debug!("malformed beacon id {:?} dropped", beacon_id);
                return;
            }
        };

        let record = match registry.get(&id) {
            Some(record) => record,
            None => {
                log_debug!("unknown beacon {} dropped", id);
                return;
            }
        };

        if !distance.is_finite() || distance <= 0.0 || !signal_strength.is_finite() {
            log_debug!("beacon {} reading rejected: distance {}, rssi {}", id, distance, signal_strength);
            return;
        }

        self.record_observation(BeaconObservation {
            beacon_id: id,
            signal_type: record.signal_type,
            measured_distance: distance,
            signal_strength,
            observed_at: now,
        });
    }

    /// Keeps a pose if it clears the trust threshold; others are ignored entirely
    pub fn ingest_pose(&mut self, pose: PoseEstimate) {
        if !(pose.confidence >= self.config.pose_trust_threshold) || !pose.location.position.is_finite() {
            log_debug!("untrusted pose (confidence {}) ignored", pose.confidence);
            return;
        }
        match &self.latest_pose {
            Some(latest) if latest.timestamp > pose.timestamp => {}
            _ => self.latest_pose = Some(pose),
        }
    }

    /// Pulls every ready record from `feed`, stamping ranges with `clock`
    pub fn drain_feed<F, C>(&mut self, feed: &mut F, clock: &C, registry: &BeaconRegistry) -> FeedDrain
    where
        F: Feed<Item = FusionInput>,
        C: TimeSource + ?Sized,
    {
        let mut drain = FeedDrain::default();
        loop {
            match feed.poll_next() {
                Ok(FusionInput::Beacon(scan)) => {
                    self.ingest_beacon(clock.now(), registry, &scan.beacon_id, scan.signal_strength, scan.distance);
                    drain.ingested += 1;
                }
                Ok(FusionInput::Pose(pose)) => {
                    self.ingest_pose(pose);
                    drain.ingested += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(FeedError::Closed)) => {
                    drain.closed = true;
                    break;
                }
                Err(nb::Error::Other(FeedError::Malformed { reason })) => {
                    log_debug!("malformed feed record: {}", reason);
                    drain.malformed += 1;
                }
            }
        }
        drain
    }

    /// Stores the latest observation for a beacon
    ///
    /// When the table is full, the stalest beacon makes room.
    fn record_observation(&mut self, observation: BeaconObservation) {
        if !self.observations.contains_key(&observation.beacon_id)
            && self.observations.len() >= MAX_LIVE_OBSERVATIONS
        {
            let stalest = self
                .observations
                .values()
                .min_by_key(|o| o.observed_at)
                .map(|o| o.beacon_id.clone());
            if let Some(id) = stalest {
                self.observations.remove(&id);
            }
        }
        self.observations.insert(observation.beacon_id.clone(), observation);
    }

    pub fn last(&self) -> Option<&FusedPosition> {
        self.last.as_ref()
    }

    pub fn state(&self) -> EvidenceState {
        self.state
    }

    pub fn live_observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Recomputes the fused position
    pub fn tick(&mut self, now: Timestamp, registry: &BeaconRegistry) -> Option<FusedPosition> {
        let config = self.config;
        let max_age = config.beacon_max_age_ms;
        self.observations
            .retain(|_, o| elapsed_ms(o.observed_at, now) <= max_age);

        let majority = self.majority_floor(registry);

        let pose = match self.latest_pose {
            Some(pose) if elapsed_ms(pose.timestamp, now) <= config.pose_max_age_ms => Some(pose),
            Some(pose) => {
                log_debug!("pose from {} is stale at {}, dropped", pose.timestamp, now);
                self.latest_pose = None;
                None
            }
            None => None,
        };

        let remembered_floor = self
            .trusted_floor
            .filter(|(_, at)| elapsed_ms(*at, now) <= config.pose_floor_memory_ms)
            .map(|(floor, _)| floor);
        let pose_floor = pose.as_ref().map(|p| p.location.floor).or(remembered_floor);

        if let (Some(pose_floor), Some((beacon_floor, count))) = (pose_floor, majority) {
            if pose_floor != beacon_floor && count >= config.min_beacons_for_fix {
                log_debug!(
                    "floor ambiguous: pose says {}, {} beacons say {}",
                    pose_floor,
                    count,
                    beacon_floor
                );
                self.state = EvidenceState::FloorAmbiguous;
                return self.emit_held(now, ConfidenceScore::MIN_CONFIDENCE);
            }
        }

        let believed_floor = match pose_floor.or(majority.map(|(floor, _)| floor)) {
            Some(floor) => floor,
            None => return self.hold(now),
        };

        let measurements = self.measurements_on(believed_floor, registry);
        let beacon_count = measurements.len();

        let beacon_fix = if beacon_count >= config.min_beacons_for_fix {
            match locate(&measurements, config.mount_offset) {
                Ok(fix) => Some(fix),
                Err(err) => {
                    log_debug!("multilateration rejected on {}: {:?}", believed_floor, err);
                    None
                }
            }
        } else {
            None
        };

        if beacon_fix.is_none() && pose.is_none() {
            return self.hold(now);
        }

        if self.filter_floor != Some(believed_floor) {
            self.filter.reset();
            self.filter_floor = Some(believed_floor);
        }

        let beacon_confidence = ConfidenceScore::from_beacon_count(beacon_count);
        let confidence = match (beacon_fix, &pose) {
            (Some(fix), Some(pose)) => {
                self.filter.apply_beacon_fix(fix, config.beacon_gain, now);
                self.filter.apply_pose(pose.location.position, pose.confidence, now);
                self.state = EvidenceState::BeaconsAndPose;
                beacon_confidence.max(ConfidenceScore::from_float(pose.confidence))
            }
            (Some(fix), None) => {
                self.filter.apply_beacon_fix(fix, config.beacon_gain, now);
                self.state = EvidenceState::Beacons;
                beacon_confidence
            }
            (None, Some(pose)) => {
                self.filter.apply_pose(pose.location.position, pose.confidence, now);
                self.state = EvidenceState::PoseOnly;
                let pose_confidence = ConfidenceScore::from_float(pose.confidence);
                let base = if self.last.is_some() {
                    self.evidence_confidence.min(pose_confidence)
                } else {
                    pose_confidence
                };
                base * config.pose_only_decay
            }
            (None, None) => return self.hold(now),
        };

        if let Some(pose) = &pose {
            self.trusted_floor = Some((pose.location.floor, now));
        }

        let position = self.filter.estimate()?;
        self.evidence_confidence = confidence;
        self.evidence_at = now;

        let fused = FusedPosition {
            location: Location::new(position, believed_floor),
            confidence,
            timestamp: now,
        };
        self.last = Some(fused);
        Some(fused)
    }

    /// Live observations not yet handed to calibration, at the last position
    ///
    /// Only pose-anchored positions above `sample_min_confidence` qualify: a
    /// position computed from the beacons themselves would just confirm
    /// their current coordinates.
    pub fn take_calibration_samples(&mut self, registry: &BeaconRegistry) -> Vec<SampleCandidate> {
        let min_confidence = ConfidenceScore::from_float(self.config.sample_min_confidence);
        let fused = match self.last {
            Some(fused) => fused,
            None => return Vec::new(),
        };
        let pose_anchored = matches!(
            self.state,
            EvidenceState::PoseOnly | EvidenceState::BeaconsAndPose
        );
        if !pose_anchored || fused.confidence < min_confidence {
            return Vec::new();
        }

        let since = self.sampled_until;
        let samples: Vec<SampleCandidate> = self
            .observations
            .values()
            .filter(|o| o.observed_at > since)
            .filter(|o| {
                registry
                    .get(&o.beacon_id)
                    .map_or(false, |r| r.floor == fused.location.floor)
            })
            .map(|o| SampleCandidate {
                beacon_id: o.beacon_id.clone(),
                signal_type: o.signal_type,
                position: fused.location.position,
                signal_strength: o.signal_strength,
                distance: o.measured_distance,
                timestamp: o.observed_at,
            })
            .collect();

        if let Some(newest) = samples.iter().map(|s| s.timestamp).max() {
            self.sampled_until = newest;
        }
        samples
    }

    /// Floor seen by most live beacons; ties go to the lowest floor
    fn majority_floor(&self, registry: &BeaconRegistry) -> Option<(FloorId, usize)> {
        let mut counts: BTreeMap<FloorId, usize> = BTreeMap::new();
        for id in self.observations.keys() {
            if let Some(record) = registry.get(id) {
                *counts.entry(record.floor).or_insert(0) += 1;
            }
        }

        let mut best: Option<(FloorId, usize)> = None;
        for (floor, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((floor, count));
            }
        }
        best
    }

    fn measurements_on(&self, floor: FloorId, registry: &BeaconRegistry) -> Vec<RangeMeasurement> {
        self.observations
            .values()
            .filter_map(|o| {
                let record = registry.get(&o.beacon_id)?;
                (record.floor == floor).then_some(RangeMeasurement {
                    beacon_position: record.position,
                    distance: o.measured_distance,
                })
            })
            .collect()
    }

    /// No usable evidence: keep the last position with decaying confidence
    ///
    /// Decay runs from the last evidence-backed emission, so consecutive held
    /// ticks never gain confidence.
    fn hold(&mut self, now: Timestamp) -> Option<FusedPosition> {
        if self.last.is_none() {
            self.state = EvidenceState::NoEvidence;
            return None;
        }

        self.state = EvidenceState::Holding;
        let confidence = self
            .evidence_confidence
            .decay(elapsed_ms(self.evidence_at, now), self.config.hold_half_life_ms);
        self.emit_held(now, confidence)
    }

    fn emit_held(&mut self, now: Timestamp, confidence: ConfidenceScore) -> Option<FusedPosition> {
        let previous = self.last?;
        let held = FusedPosition {
            location: previous.location,
            confidence,
            timestamp: now,
        };
        self.last = Some(held);
        Some(held)
    }
}
