//! Weighted multilateration from beacon ranges
//!
//! Observations are sorted by measured distance so the closest (least noisy)
//! beacon becomes the reference row of the linearised system. Each remaining
//! row is weighted by `1/d²`. Height is not solved for: beacons on one floor
//! sit at nearly the same height, which makes z unobservable from ranges.
//! Instead the device is placed at the weighted mean beacon height minus the
//! mount offset, and that height difference is removed from each slant range
//! before the horizontal solve.

use alloc::vec::Vec;

use crate::constants::fusion::MIN_RANGE_M;
use crate::geometry::{horizontal_range, solve_weighted_ranges, GeometryError, Position, RangeAnchor};

/// One usable range: beacon position and measured distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMeasurement {
    pub beacon_position: Position,
    pub distance: f64,
}

/// Locates a device from three or more ranges on one floor
pub fn locate(measurements: &[RangeMeasurement], mount_offset: f64) -> Result<Position, GeometryError> {
    if measurements.len() < 3 {
        return Err(GeometryError::TooFewAnchors {
            required: 3,
            available: measurements.len(),
        });
    }

    let mut sorted: Vec<RangeMeasurement> = measurements.to_vec();
    sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let weights: Vec<f64> = sorted
        .iter()
        .map(|m| {
            let d = m.distance.max(MIN_RANGE_M);
            1.0 / (d * d)
        })
        .collect();

    let weight_sum: f64 = weights.iter().sum();
    let mean_height = sorted
        .iter()
        .zip(&weights)
        .map(|(m, w)| m.beacon_position.z * w)
        .sum::<f64>()
        / weight_sum;
    let z = mean_height - mount_offset;

    let anchors: Vec<RangeAnchor> = sorted
        .iter()
        .zip(&weights)
        .map(|(m, &weight)| RangeAnchor {
            position: m.beacon_position,
            range: horizontal_range(m.distance, m.beacon_position.z - z),
            weight,
        })
        .collect();

    let (x, y) = solve_weighted_ranges(&anchors)?;
    Ok(Position::new(x, y, z))
}
