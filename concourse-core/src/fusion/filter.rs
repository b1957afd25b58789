//! Position filter blending beacon fixes and poses
//!
//! ## Gain Modes
//!
//! ```text
//! Fixed:     new = α·pose + (1−α)·previous         α = 0.7
//! Adaptive:  P⁻ = P + q·Δt
//!            R  = r / confidence
//!            K  = P⁻ / (P⁻ + R)
//!            new = K·pose + (1−K)·previous,  P = (1−K)·P⁻
//! ```
//!
//! The adaptive mode is a scalar Kalman filter shared by all three axes: a
//! long gap since the last update or a very confident pose pushes the gain
//! toward 1. Fixed gain is the default.

use crate::constants::fusion::{ADAPTIVE_POSE_VARIANCE, ADAPTIVE_PROCESS_NOISE};
use crate::geometry::Position;
use crate::time::{elapsed_ms, Timestamp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How much weight a trusted pose gets against the previous estimate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GainMode {
    /// Constant blend factor α ∈ (0, 1]
    Fixed { alpha: f64 },
    /// Scalar Kalman gain from elapsed time and pose confidence
    Adaptive {
        /// Variance growth per second, m²/s
        process_noise: f64,
        /// Pose variance at confidence 1.0, m²
        pose_variance: f64,
    },
}

impl GainMode {
    pub fn adaptive() -> Self {
        Self::Adaptive {
            process_noise: ADAPTIVE_PROCESS_NOISE,
            pose_variance: ADAPTIVE_POSE_VARIANCE,
        }
    }
}

/// Filtered position estimate for one subject
#[derive(Debug, Clone)]
pub struct PositionFilter {
    mode: GainMode,
    estimate: Option<Position>,
    /// Shared per-axis variance, adaptive mode only
    variance: f64,
    updated_at: Timestamp,
}

impl PositionFilter {
    pub fn new(mode: GainMode) -> Self {
        Self {
            mode,
            estimate: None,
            variance: ADAPTIVE_POSE_VARIANCE,
            updated_at: 0,
        }
    }

    pub fn estimate(&self) -> Option<Position> {
        self.estimate
    }

    /// Incorporates a multilateration fix with gain `beacon_gain`
    pub fn apply_beacon_fix(&mut self, fix: Position, beacon_gain: f64, now: Timestamp) {
        self.estimate = Some(match self.estimate {
            Some(previous) => previous.blend_toward(&fix, beacon_gain),
            None => fix,
        });
        self.variance = self.measurement_variance(1.0);
        self.updated_at = now;
    }

    /// Blends a trusted pose into the estimate, returning the gain used
    pub fn apply_pose(&mut self, pose: Position, confidence: f32, now: Timestamp) -> f64 {
        let previous = match self.estimate {
            Some(previous) => previous,
            None => {
                self.estimate = Some(pose);
                self.variance = self.measurement_variance(confidence);
                self.updated_at = now;
                return 1.0;
            }
        };

        let gain = match self.mode {
            GainMode::Fixed { alpha } => alpha,
            GainMode::Adaptive { process_noise, .. } => {
                let dt_s = elapsed_ms(self.updated_at, now) as f64 / 1000.0;
                let predicted = self.variance + process_noise * dt_s;
                let measurement = self.measurement_variance(confidence);
                let gain = predicted / (predicted + measurement);
                self.variance = (1.0 - gain) * predicted;
                gain
            }
        };

        self.estimate = Some(previous.blend_toward(&pose, gain));
        self.updated_at = now;
        gain
    }

    /// Forgets the estimate (e.g. after a floor change)
    pub fn reset(&mut self) {
        self.estimate = None;
        self.variance = self.measurement_variance(1.0);
    }

    fn measurement_variance(&self, confidence: f32) -> f64 {
        let base = match self.mode {
            GainMode::Adaptive { pose_variance, .. } => pose_variance,
            GainMode::Fixed { .. } => ADAPTIVE_POSE_VARIANCE,
        };
        base / f64::from(confidence.max(0.01))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_gain_blends_per_axis() {
        let mut filter = PositionFilter::new(GainMode::Fixed { alpha: 0.7 });
        filter.apply_beacon_fix(Position::new(0.0, 0.0, 0.0), 1.0, 0);

        let gain = filter.apply_pose(Position::new(10.0, 20.0, 1.0), 0.9, 100);
        assert_eq!(gain, 0.7);

        let est = filter.estimate().unwrap();
        assert!((est.x - 7.0).abs() < 1e-12);
        assert!((est.y - 14.0).abs() < 1e-12);
        assert!((est.z - 0.7).abs() < 1e-12);
    }

    #[test]
    fn first_pose_initialises() {
        let mut filter = PositionFilter::new(GainMode::Fixed { alpha: 0.7 });
        filter.apply_pose(Position::new(3.0, 4.0, 0.0), 0.8, 10);
        assert_eq!(filter.estimate(), Some(Position::new(3.0, 4.0, 0.0)));
    }

    #[test]
    fn adaptive_gain_grows_with_elapsed_time() {
        let mut quick = PositionFilter::new(GainMode::adaptive());
        quick.apply_beacon_fix(Position::ORIGIN, 1.0, 0);
        let short_gain = quick.apply_pose(Position::new(1.0, 0.0, 0.0), 0.9, 100);

        let mut slow = PositionFilter::new(GainMode::adaptive());
        slow.apply_beacon_fix(Position::ORIGIN, 1.0, 0);
        let long_gain = slow.apply_pose(Position::new(1.0, 0.0, 0.0), 0.9, 10_000);

        assert!(long_gain > short_gain);
        assert!(short_gain > 0.0 && long_gain < 1.0);
    }

    #[test]
    fn adaptive_gain_trusts_confident_poses_more() {
        let mut low = PositionFilter::new(GainMode::adaptive());
        low.apply_beacon_fix(Position::ORIGIN, 1.0, 0);
        let low_gain = low.apply_pose(Position::new(1.0, 0.0, 0.0), 0.7, 1000);

        let mut high = PositionFilter::new(GainMode::adaptive());
        high.apply_beacon_fix(Position::ORIGIN, 1.0, 0);
        let high_gain = high.apply_pose(Position::new(1.0, 0.0, 0.0), 1.0, 1000);

        assert!(high_gain > low_gain);
    }
}
