//! Rolling drift history per beacon
//!
//! Every recalibration records how far the beacon moved. The current drift
//! is not the last offset but a weighted mean over the past day:
//!
//! ```text
//! wᵢ     = confidenceᵢ · 2^(−ageᵢ / half_life)
//! drift  = Σ wᵢ·offsetᵢ / Σ wᵢ
//! ```
//!
//! A single noisy recalibration therefore cannot dominate, and old offsets
//! fade out even before they leave the window.

use crate::buffer::CircularBuffer;
use crate::constants::calibration::DRIFT_HISTORY_CAPACITY;
use crate::geometry::Position;
use crate::time::{elapsed_ms, Timestamp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset applied by one recalibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriftRecord {
    pub timestamp: Timestamp,
    /// New position minus old position
    pub offset: Position,
    pub magnitude: f64,
    /// Confidence of the solve that produced the offset
    pub confidence: f32,
}

/// Bounded drift history for one beacon
#[derive(Debug, Clone, Default)]
pub struct DriftHistory {
    records: CircularBuffer<DriftRecord, DRIFT_HISTORY_CAPACITY>,
}

impl DriftHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DriftRecord) {
        self.records.push(record);
    }

    /// Drops records older than `window_ms`, returning how many went
    pub fn prune(&mut self, now: Timestamp, window_ms: u64) -> usize {
        self.records
            .evict_while(|r| elapsed_ms(r.timestamp, now) > window_ms)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&DriftRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DriftRecord> {
        self.records.iter()
    }

    /// Confidence- and recency-weighted mean offset
    ///
    /// Zero when the history is empty or every weight vanished.
    pub fn weighted_offset(&self, now: Timestamp, half_life_ms: u64) -> Position {
        let mut sum = Position::ORIGIN;
        let mut weight_sum = 0.0;

        for record in self.records.iter() {
            let age = elapsed_ms(record.timestamp, now) as f64;
            let recency = if half_life_ms == 0 {
                1.0
            } else {
                libm::exp2(-age / half_life_ms as f64)
            };
            let weight = f64::from(record.confidence) * recency;
            sum = sum + record.offset * weight;
            weight_sum += weight;
        }

        if weight_sum <= f64::EPSILON {
            return Position::ORIGIN;
        }
        sum * (1.0 / weight_sum)
    }
}
