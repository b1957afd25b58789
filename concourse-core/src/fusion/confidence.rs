//! Confidence Scores for Fused Positions
//!
//! ## Overview
//!
//! Every fused position carries a confidence in [0, 1]. It is what consumers
//! use to decide whether to show a blue dot, a fuzzy halo or nothing at all,
//! and it is the only channel through which fusion reports trouble such as
//! floor ambiguity.
//!
//! ## Sources of Confidence
//!
//! ```text
//! beacon fix      min(1, n / 5)            n = beacons used
//! pose only       min(prev, pose) × 0.95   never improves
//! beacons + pose  max(beacon, pose)
//! holding         last evidence × 2^(−t / 10 s)
//! ambiguous floor 0.01 (minimum)
//! ```
//!
//! ## Implementation Notes
//!
//! - Stored as u16 fixed point, so equality and ordering are exact
//! - `decay` is a true exponential, not a shift approximation

use core::ops::Mul;

use crate::constants::fusion::{BEACONS_FOR_FULL_CONFIDENCE, CONFIDENCE_MIN_FIXED, FIXED_POINT_SCALE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Confidence score in range [0, 1]
///
/// Internally stored as fixed-point for determinism.
/// 0.0 = no confidence, 1.0 = full confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "f32", into = "f32"))]
pub struct ConfidenceScore {
    /// Fixed-point representation (0-65535 maps to 0.0-1.0)
    value: u16,
}

impl ConfidenceScore {
    /// Minimum meaningful confidence (1%)
    pub const MIN_CONFIDENCE: Self = Self { value: CONFIDENCE_MIN_FIXED };

    /// Maximum confidence (100%)
    pub const MAX_CONFIDENCE: Self = Self { value: u16::MAX };

    /// No confidence (0%)
    pub const ZERO: Self = Self { value: 0 };

    /// Create from floating point value [0, 1]
    ///
    /// NaN maps to zero.
    pub fn from_float(confidence: f32) -> Self {
        if confidence.is_nan() {
            return Self::ZERO;
        }
        let clamped = confidence.max(0.0).min(1.0);
        Self {
            value: libm::roundf(clamped * FIXED_POINT_SCALE) as u16,
        }
    }

    /// Beacon-path confidence: `min(1, count / 5)`
    pub fn from_beacon_count(count: usize) -> Self {
        Self::from_float(count as f32 / BEACONS_FOR_FULL_CONFIDENCE as f32)
    }

    /// Convert to floating point [0, 1]
    pub fn as_float(&self) -> f32 {
        self.value as f32 / FIXED_POINT_SCALE
    }

    /// Get raw fixed-point value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Apply exponential decay over time: `self × 2^(−t / half_life)`
    pub fn decay(&self, time_delta_ms: u64, half_life_ms: u64) -> Self {
        if time_delta_ms == 0 || half_life_ms == 0 {
            return *self;
        }

        let factor = libm::exp2f(-(time_delta_ms as f32) / half_life_ms as f32);
        *self * factor
    }
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Mul<f32> for ConfidenceScore {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self::from_float(self.as_float() * factor)
    }
}

impl From<f32> for ConfidenceScore {
    fn from(value: f32) -> Self {
        Self::from_float(value)
    }
}

impl From<ConfidenceScore> for f32 {
    fn from(score: ConfidenceScore) -> f32 {
        score.as_float()
    }
}
