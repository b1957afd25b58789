//! Beacon Calibration and Drift Tracking
//!
//! ## Overview
//!
//! Beacons get knocked, remounted and moved by renovation crews; the floor
//! plan rarely hears about it. Calibration re-derives each beacon's position
//! from what passengers' devices heard, at positions fusion trusted, and
//! writes the result back to the shared [`BeaconRegistry`].
//!
//! ## Calibration Pass
//!
//! ```text
//! for each beacon with samples:
//!   evict samples older than 24 h
//!   skip unless ≥ 10 samples and the interval elapsed (or never calibrated)
//!   solve x/y by weighted least squares (1/d²), keep z
//!   skip if < 3 distinct sample positions or near-collinear geometry
//!   drift = |new − old|, rate = drift / days since last calibration
//!   recalibrated and rate / 24 > max_drift_per_hour → alert (the update
//!   still happens)
//!   update registry, append drift record
//! ```
//!
//! Skips are reported in the [`CalibrationReport`], never returned as errors:
//! one degenerate beacon must not stop the rest of the pass.

pub mod drift;
pub mod solver;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use thiserror_no_std::Error;

pub use drift::{DriftHistory, DriftRecord};
pub use solver::{estimate_position, BeaconEstimate};

use crate::beacon::{BeaconId, BeaconRegistry, SignalType};
use crate::buffer::CircularBuffer;
use crate::constants::calibration::{
    DEFAULT_CALIBRATION_INTERVAL_MS, DEFAULT_DRIFT_ALERT_MAGNITUDE_M, DEFAULT_MAX_DRIFT_PER_HOUR_M,
    DRIFT_RECENCY_HALF_LIFE_MS, DRIFT_WINDOW_MS, MIN_INDEPENDENT_SAMPLES, MIN_SAMPLES_FOR_CALIBRATION,
    SAMPLE_CAPACITY, SAMPLE_MAX_AGE_MS,
};
use crate::constants::time::{HOURS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE};
use crate::errors::ConfigError;
use crate::fusion::SampleCandidate;
use crate::geometry::Position;
use crate::time::{elapsed_hours, elapsed_ms, TimeSource, Timestamp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a calibration sample measured
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleMeasure {
    /// Received signal strength, dBm
    Rssi(f64),
    /// Direct range (UWB), metres
    Distance(f64),
}

/// One reading of a beacon taken at a known device position
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationSample {
    pub position: Position,
    pub measure: SampleMeasure,
    pub timestamp: Timestamp,
}

/// Why a beacon was left alone in a pass
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalibrationSkip {
    /// Samples exist for a beacon the registry does not know
    #[error("Beacon not in registry")]
    UnknownBeacon,

    #[error("Insufficient samples: need {required}, have {count}")]
    InsufficientSamples { count: usize, required: usize },

    #[error("Calibrated recently, {remaining_ms} ms until eligible")]
    IntervalNotElapsed { remaining_ms: u64 },

    /// Samples come from too few distinct places
    #[error("Samples from {distinct} distinct positions, need {required}")]
    TooFewPositions { distinct: usize, required: usize },

    /// Sample positions (nearly) on a line
    #[error("Degenerate sample geometry")]
    DegenerateGeometry,
}

/// A beacon moved by a pass
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconUpdate {
    pub beacon_id: BeaconId,
    pub old_position: Position,
    pub new_position: Position,
    /// |new − old|, metres
    pub drift: f64,
    /// Metres per day
    pub drift_rate: f64,
    pub confidence: f32,
    /// Rate exceeded `max_drift_per_hour`
    pub excessive: bool,
}

/// A beacon left alone by a pass
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkippedBeacon {
    pub beacon_id: BeaconId,
    pub reason: CalibrationSkip,
}

/// Outcome of one calibration pass
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationReport {
    pub timestamp: Timestamp,
    pub updates: Vec<BeaconUpdate>,
    pub skipped: Vec<SkippedBeacon>,
}

impl CalibrationReport {
    pub fn was_updated(&self, beacon_id: &BeaconId) -> bool {
        self.updates.iter().any(|u| &u.beacon_id == beacon_id)
    }

    pub fn skip_reason(&self, beacon_id: &BeaconId) -> Option<CalibrationSkip> {
        self.skipped
            .iter()
            .find(|s| &s.beacon_id == beacon_id)
            .map(|s| s.reason)
    }
}

/// Beacon whose weighted drift exceeds the alert magnitude
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriftAlert {
    pub beacon_id: BeaconId,
    pub drift: Position,
    pub magnitude: f64,
}

/// Per-beacon calibration diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconCalibrationStats {
    /// Drift of the last recalibration, metres
    pub drift: f64,
    /// Metres per day at the last recalibration
    pub drift_rate: f64,
    pub last_calibration: Option<Timestamp>,
    pub sample_count: usize,
    pub alert_count: u32,
}

/// Calibration tuning
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalibrationConfig {
    pub min_samples: usize,
    pub min_distinct_positions: usize,
    /// Minimum time between calibrations of one beacon (ms)
    pub calibration_interval_ms: u64,
    pub sample_max_age_ms: u64,
    /// Drift rate alert threshold, metres per hour
    pub max_drift_per_hour: f64,
    /// Weighted drift magnitude reported by `check_drift`, metres
    pub drift_alert_magnitude: f64,
    pub drift_window_ms: u64,
    pub drift_half_life_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES_FOR_CALIBRATION,
            min_distinct_positions: MIN_INDEPENDENT_SAMPLES,
            calibration_interval_ms: DEFAULT_CALIBRATION_INTERVAL_MS,
            sample_max_age_ms: SAMPLE_MAX_AGE_MS,
            max_drift_per_hour: DEFAULT_MAX_DRIFT_PER_HOUR_M,
            drift_alert_magnitude: DEFAULT_DRIFT_ALERT_MAGNITUDE_M,
            drift_window_ms: DRIFT_WINDOW_MS,
            drift_half_life_ms: DRIFT_RECENCY_HALF_LIFE_MS,
        }
    }
}

impl CalibrationConfig {
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_calibration_interval(mut self, ms: u64) -> Self {
        self.calibration_interval_ms = ms;
        self
    }

    pub fn with_max_drift_per_hour(mut self, metres: f64) -> Self {
        self.max_drift_per_hour = metres;
        self
    }

    pub fn with_drift_alert_magnitude(mut self, metres: f64) -> Self {
        self.drift_alert_magnitude = metres;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_range("min_samples", self.min_samples as f64, 3.0, SAMPLE_CAPACITY as f64)?;
        ConfigError::check_range("min_distinct_positions", self.min_distinct_positions as f64, 3.0, 8.0)?;
        ConfigError::check_nonzero("sample_max_age_ms", self.sample_max_age_ms)?;
        ConfigError::check_nonzero("drift_window_ms", self.drift_window_ms)?;
        ConfigError::check_nonzero("drift_half_life_ms", self.drift_half_life_ms)?;
        ConfigError::check_range("max_drift_per_hour", self.max_drift_per_hour, 0.0, 1000.0)?;
        ConfigError::check_range("drift_alert_magnitude", self.drift_alert_magnitude, 0.0, 1000.0)
    }
}

/// Samples, drift history and counters for one beacon
#[derive(Debug, Clone, Default)]
struct BeaconCalibration {
    samples: CircularBuffer<CalibrationSample, SAMPLE_CAPACITY>,
    drift: DriftHistory,
    last_calibration: Option<Timestamp>,
    last_drift: f64,
    last_drift_rate: f64,
    alert_count: u32,
}

impl BeaconCalibration {
    fn evict_samples(&mut self, now: Timestamp, max_age_ms: u64) {
        self.samples
            .evict_while(|s| elapsed_ms(s.timestamp, now) > max_age_ms);
    }
}

/// Recomputes believed beacon positions from collected samples
pub struct CalibrationEngine<C: TimeSource> {
    clock: C,
    config: CalibrationConfig,
    beacons: BTreeMap<BeaconId, BeaconCalibration>,
    excessive_drift_alerts: u64,
}

impl<C: TimeSource> CalibrationEngine<C> {
    pub fn new(clock: C, config: CalibrationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clock,
            config,
            beacons: BTreeMap::new(),
            excessive_drift_alerts: 0,
        })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Records an RSSI reading taken at `position` just now
    pub fn record_sample(&mut self, beacon_id: &BeaconId, position: Position, signal_strength: f64) {
        let now = self.clock.now();
        self.record_measure(beacon_id, position, SampleMeasure::Rssi(signal_strength), now);
    }

    /// Records a direct range (UWB) taken at `position` just now
    pub fn record_distance_sample(&mut self, beacon_id: &BeaconId, position: Position, distance: f64) {
        let now = self.clock.now();
        self.record_measure(beacon_id, position, SampleMeasure::Distance(distance), now);
    }

    /// Records fusion output at the time each beacon was heard: RSSI for BLE
    /// beacons, ranges for UWB
    pub fn record_candidates(&mut self, candidates: &[SampleCandidate]) {
        for candidate in candidates {
            let measure = match candidate.signal_type {
                SignalType::ShortRange => SampleMeasure::Rssi(candidate.signal_strength),
                SignalType::UltraWideband => SampleMeasure::Distance(candidate.distance),
            };
            self.record_measure(&candidate.beacon_id, candidate.position, measure, candidate.timestamp);
        }
    }

    fn record_measure(&mut self, beacon_id: &BeaconId, position: Position, measure: SampleMeasure, observed_at: Timestamp) {
        let valid = position.is_finite()
            && match measure {
                SampleMeasure::Rssi(rssi) => rssi.is_finite(),
                SampleMeasure::Distance(distance) => distance.is_finite() && distance > 0.0,
            };
        if !valid {
            log_debug!("calibration sample for {} rejected", beacon_id);
            return;
        }

        let now = self.clock.now();
        let max_age = self.config.sample_max_age_ms;
        if elapsed_ms(observed_at, now) > max_age {
            log_debug!("calibration sample for {} expired before it arrived", beacon_id);
            return;
        }

        let state = self.beacons.entry(beacon_id.clone()).or_default();
        state.evict_samples(now, max_age);
        state.samples.push(CalibrationSample {
            position,
            measure,
            timestamp: observed_at.min(now),
        });
    }

    /// Retained samples for a beacon
    pub fn sample_count(&self, beacon_id: &BeaconId) -> usize {
        self.beacons.get(beacon_id).map_or(0, |s| s.samples.len())
    }

    /// Recalibrates every eligible beacon and writes results to `registry`
    pub fn run_calibration_pass(&mut self, registry: &mut BeaconRegistry) -> CalibrationReport {
        let now = self.clock.now();
        let config = self.config;
        let mut report = CalibrationReport {
            timestamp: now,
            ..CalibrationReport::default()
        };

        for (beacon_id, state) in self.beacons.iter_mut() {
            state.evict_samples(now, config.sample_max_age_ms);
            state.drift.prune(now, config.drift_window_ms);

            let record = match registry.get(beacon_id) {
                Some(record) => record,
                None => {
                    report.skipped.push(SkippedBeacon {
                        beacon_id: beacon_id.clone(),
                        reason: CalibrationSkip::UnknownBeacon,
                    });
                    continue;
                }
            };

            let count = state.samples.len();
            if count < config.min_samples {
                report.skipped.push(SkippedBeacon {
                    beacon_id: beacon_id.clone(),
                    reason: CalibrationSkip::InsufficientSamples {
                        count,
                        required: config.min_samples,
                    },
                });
                continue;
            }

            if let Some(last) = state.last_calibration {
                let since = elapsed_ms(last, now);
                if since < config.calibration_interval_ms {
                    report.skipped.push(SkippedBeacon {
                        beacon_id: beacon_id.clone(),
                        reason: CalibrationSkip::IntervalNotElapsed {
                            remaining_ms: config.calibration_interval_ms - since,
                        },
                    });
                    continue;
                }
            }

            let estimate = match estimate_position(record, state.samples.iter(), config.min_distinct_positions) {
                Ok(estimate) => estimate,
                Err(reason) => {
                    log_debug!("calibration of {} skipped: {}", beacon_id, reason);
                    report.skipped.push(SkippedBeacon {
                        beacon_id: beacon_id.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let old_position = record.position;
            let offset = estimate.position - old_position;
            let drift = offset.norm();

            let reference = state
                .last_calibration
                .or_else(|| state.samples.first().map(|s| s.timestamp))
                .unwrap_or(now);
            let hours = elapsed_hours(reference, now).max(MS_PER_MINUTE as f64 / MS_PER_HOUR as f64);
            let per_hour = drift / hours;
            let drift_rate = per_hour * HOURS_PER_DAY as f64;

            // A first calibration measures the installation offset, not movement
            let excessive = state.last_calibration.is_some() && per_hour > config.max_drift_per_hour;
            if excessive {
                state.alert_count += 1;
                self.excessive_drift_alerts += 1;
                log_warn!(
                    "beacon {} drifting {:.3} m/h (limit {:.3}), moved {:.2} m",
                    beacon_id,
                    per_hour,
                    config.max_drift_per_hour,
                    drift
                );
            }

            registry.update_position(beacon_id, estimate.position, now);
            state.drift.record(DriftRecord {
                timestamp: now,
                offset,
                magnitude: drift,
                confidence: estimate.confidence,
            });
            state.last_calibration = Some(now);
            state.last_drift = drift;
            state.last_drift_rate = drift_rate;

            log_debug!(
                "beacon {} recalibrated from {} samples, drift {:.3} m",
                beacon_id,
                estimate.samples_used,
                drift
            );

            report.updates.push(BeaconUpdate {
                beacon_id: beacon_id.clone(),
                old_position,
                new_position: estimate.position,
                drift,
                drift_rate,
                confidence: estimate.confidence,
                excessive,
            });
        }

        log_info!(
            "calibration pass: {} updated, {} skipped",
            report.updates.len(),
            report.skipped.len()
        );
        report
    }

    /// Confidence- and recency-weighted drift vector of a beacon
    pub fn current_drift(&self, beacon_id: &BeaconId) -> Option<Position> {
        let now = self.clock.now();
        let state = self.beacons.get(beacon_id)?;
        Some(state.drift.weighted_offset(now, self.config.drift_half_life_ms))
    }

    /// Prunes drift histories and lists beacons drifting beyond the alert magnitude
    pub fn check_drift(&mut self) -> Vec<DriftAlert> {
        let now = self.clock.now();
        let config = self.config;
        let mut alerts = Vec::new();

        for (beacon_id, state) in self.beacons.iter_mut() {
            state.drift.prune(now, config.drift_window_ms);
            let drift = state.drift.weighted_offset(now, config.drift_half_life_ms);
            let magnitude = drift.norm();
            if magnitude > config.drift_alert_magnitude {
                log_warn!("beacon {} weighted drift {:.2} m", beacon_id, magnitude);
                alerts.push(DriftAlert {
                    beacon_id: beacon_id.clone(),
                    drift,
                    magnitude,
                });
            }
        }
        alerts
    }

    /// Diagnostics for every beacon with samples or history
    pub fn get_calibration_stats(&self) -> BTreeMap<BeaconId, BeaconCalibrationStats> {
        self.beacons
            .iter()
            .map(|(id, state)| {
                (
                    id.clone(),
                    BeaconCalibrationStats {
                        drift: state.last_drift,
                        drift_rate: state.last_drift_rate,
                        last_calibration: state.last_calibration,
                        sample_count: state.samples.len(),
                        alert_count: state.alert_count,
                    },
                )
            })
            .collect()
    }

    /// Total excessive-drift alerts raised
    pub fn excessive_drift_alerts(&self) -> u64 {
        self.excessive_drift_alerts
    }
}
