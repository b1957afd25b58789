//! Beacon position solve from calibration samples
//!
//! The roles of fusion are reversed: the sample positions are the known
//! anchors and the beacon is the unknown point. RSSI samples are turned into
//! ranges with the beacon's path-loss model; UWB samples already carry one.
//! The beacon's believed height is kept, so each slant range is reduced to a
//! horizontal range using the height difference to the sample.

use alloc::vec::Vec;

use super::{CalibrationSample, CalibrationSkip, SampleMeasure};
use crate::beacon::BeaconRecord;
use crate::constants::calibration::DISTINCT_POSITION_EPSILON_M;
use crate::constants::fusion::MIN_RANGE_M;
use crate::geometry::{
    count_distinct_positions, horizontal_range, solve_weighted_ranges, weighted_range_rms, GeometryError,
    Position, RangeAnchor,
};

/// Result of a successful beacon solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeaconEstimate {
    pub position: Position,
    /// Weighted RMS of horizontal range residuals, metres
    pub residual_rms: f64,
    /// `1 / (1 + rms)`, in (0, 1]
    pub confidence: f32,
    pub samples_used: usize,
}

/// Estimates where a beacon really is from its samples
pub fn estimate_position<'a, I>(
    record: &BeaconRecord,
    samples: I,
    min_distinct_positions: usize,
) -> Result<BeaconEstimate, CalibrationSkip>
where
    I: IntoIterator<Item = &'a CalibrationSample>,
{
    let samples: Vec<&CalibrationSample> = samples.into_iter().collect();

    let distinct = count_distinct_positions(
        samples.iter().map(|s| &s.position),
        DISTINCT_POSITION_EPSILON_M,
        min_distinct_positions,
    );
    if distinct < min_distinct_positions {
        return Err(CalibrationSkip::TooFewPositions {
            distinct,
            required: min_distinct_positions,
        });
    }

    let beacon_z = record.position.z;
    let mut anchors: Vec<RangeAnchor> = samples
        .iter()
        .filter_map(|sample| {
            let slant = match sample.measure {
                SampleMeasure::Rssi(rssi) => record.path_loss.distance_from_rssi(rssi),
                SampleMeasure::Distance(distance) => distance,
            };
            if !slant.is_finite() || slant <= 0.0 {
                return None;
            }
            let d = slant.max(MIN_RANGE_M);
            Some(RangeAnchor {
                position: sample.position,
                range: horizontal_range(slant, beacon_z - sample.position.z),
                weight: 1.0 / (d * d),
            })
        })
        .collect();

    anchors.sort_by(|a, b| a.range.total_cmp(&b.range));

    let (x, y) = solve_weighted_ranges(&anchors).map_err(|err| match err {
        GeometryError::TooFewAnchors { available, required } => CalibrationSkip::TooFewPositions {
            distinct: available,
            required,
        },
        GeometryError::Collinear | GeometryError::InvalidInput => CalibrationSkip::DegenerateGeometry,
    })?;

    let residual_rms = weighted_range_rms(&anchors, x, y);
    Ok(BeaconEstimate {
        position: Position::new(x, y, beacon_z),
        residual_rms,
        confidence: (1.0 / (1.0 + residual_rms)) as f32,
        samples_used: anchors.len(),
    })
}
