//! Building-frame geometry and weighted range solving
//!
//! Positions are metres in a building-local frame. A position alone is never
//! enough to identify a place: two points with the same x/y on different
//! floors are different locations, so anything that crosses component
//! boundaries carries a [`Location`] (position + floor).
//!
//! ## Weighted range solve
//!
//! Both fusion (locating a phone from beacons) and calibration (locating a
//! beacon from phone samples) solve the same problem: find the point whose
//! distances to known anchors best match measured ranges. Subtracting the
//! squared-range equation of a reference anchor from every other anchor's
//! equation removes the quadratic terms:
//!
//! ```text
//! (x−xᵢ)² + (y−yᵢ)² = rᵢ²        for each anchor i
//! 2(xᵢ−x₁)·x + 2(yᵢ−y₁)·y = r₁² − rᵢ² − x₁² + xᵢ² − y₁² + yᵢ²
//! ```
//!
//! Each row is weighted (closer anchors dominate) and the 2×2 normal
//! equations `AᵀWA·p = AᵀWb` are solved directly. Near-collinear anchor
//! layouts make `AᵀWA` close to singular; they are rejected rather than
//! allowed to amplify noise into a wild answer.

use core::fmt;
use core::ops::{Add, Mul, Sub};

use crate::constants::calibration::MIN_GEOMETRY_CONDITION;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Floor identifier (0 = ground, negative = basement levels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloorId(pub i16);

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Point (or vector) in the building-local frame, metres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length when used as a vector
    pub fn norm(&self) -> f64 {
        libm::sqrt(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (*self - *other).norm()
    }

    /// Distance ignoring height
    pub fn horizontal_distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        libm::sqrt(dx * dx + dy * dy)
    }

    /// Linear interpolation: `alpha·target + (1−alpha)·self`
    pub fn blend_toward(&self, target: &Position, alpha: f64) -> Position {
        *target * alpha + *self * (1.0 - alpha)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, factor: f64) -> Position {
        Position::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// Position paired with the floor it is on
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    pub position: Position,
    pub floor: FloorId,
}

impl Location {
    pub const fn new(position: Position, floor: FloorId) -> Self {
        Self { position, floor }
    }

    /// Same floor and within `epsilon` metres
    pub fn coincides_with(&self, other: &Location, epsilon: f64) -> bool {
        self.floor == other.floor && self.position.distance_to(&other.position) <= epsilon
    }
}

/// Unit quaternion orientation `(w, x, y, z)`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Orientation {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }
}

/// Reference point with a measured range and row weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAnchor {
    pub position: Position,
    /// Measured horizontal range, metres
    pub range: f64,
    /// Row weight, typically `1/range²`
    pub weight: f64,
}

/// Why a weighted range solve produced no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// Fewer anchors than unknowns plus one
    TooFewAnchors { required: usize, available: usize },
    /// Anchors (nearly) on a line; the normal matrix is ill-conditioned
    Collinear,
    /// Inputs contained NaN/inf or non-positive weights
    InvalidInput,
}

/// Removes the vertical component from a slant range
///
/// `dz` is the height difference between anchor and target. Ranges shorter
/// than `|dz|` (noise) collapse to zero horizontal distance.
pub fn horizontal_range(slant_range: f64, dz: f64) -> f64 {
    let h2 = slant_range * slant_range - dz * dz;
    if h2 <= 0.0 {
        0.0
    } else {
        libm::sqrt(h2)
    }
}

/// Solves for the horizontal (x, y) position best matching all ranges
///
/// `anchors[0]` is the reference row; callers put their most trusted
/// anchor (smallest range) first.
pub fn solve_weighted_ranges(anchors: &[RangeAnchor]) -> Result<(f64, f64), GeometryError> {
    if anchors.len() < 3 {
        return Err(GeometryError::TooFewAnchors {
            required: 3,
            available: anchors.len(),
        });
    }

    let valid = anchors.iter().all(|a| {
        a.position.is_finite() && a.range.is_finite() && a.weight.is_finite() && a.weight > 0.0
    });
    if !valid {
        return Err(GeometryError::InvalidInput);
    }

    let reference = &anchors[0];
    let (x1, y1, r1) = (reference.position.x, reference.position.y, reference.range);

    // Normal equations: [a11 a12; a12 a22]·p = [b1; b2]
    let mut a11 = 0.0;
    let mut a12 = 0.0;
    let mut a22 = 0.0;
    let mut b1 = 0.0;
    let mut b2 = 0.0;

    for anchor in &anchors[1..] {
        let (xi, yi, ri) = (anchor.position.x, anchor.position.y, anchor.range);
        let row_x = 2.0 * (xi - x1);
        let row_y = 2.0 * (yi - y1);
        let rhs = r1 * r1 - ri * ri - x1 * x1 + xi * xi - y1 * y1 + yi * yi;
        let w = anchor.weight;

        a11 += w * row_x * row_x;
        a12 += w * row_x * row_y;
        a22 += w * row_y * row_y;
        b1 += w * row_x * rhs;
        b2 += w * row_y * rhs;
    }

    let det = a11 * a22 - a12 * a12;
    let trace = a11 + a22;
    if trace <= 0.0 || det / (trace * trace) < MIN_GEOMETRY_CONDITION {
        return Err(GeometryError::Collinear);
    }

    let x = (a22 * b1 - a12 * b2) / det;
    let y = (a11 * b2 - a12 * b1) / det;

    if x.is_finite() && y.is_finite() {
        Ok((x, y))
    } else {
        Err(GeometryError::InvalidInput)
    }
}

/// Weighted RMS of horizontal range residuals at `(x, y)`
pub fn weighted_range_rms(anchors: &[RangeAnchor], x: f64, y: f64) -> f64 {
    let mut weighted_sq = 0.0;
    let mut weight_sum = 0.0;
    let point = Position::new(x, y, 0.0);

    for anchor in anchors {
        let flat = Position::new(anchor.position.x, anchor.position.y, 0.0);
        let residual = point.distance_to(&flat) - anchor.range;
        weighted_sq += anchor.weight * residual * residual;
        weight_sum += anchor.weight;
    }

    if weight_sum <= 0.0 {
        return 0.0;
    }
    libm::sqrt(weighted_sq / weight_sum)
}

/// Number of pairwise-distinct positions (within `epsilon`), capped at `limit`
pub fn count_distinct_positions<'a, I>(positions: I, epsilon: f64, limit: usize) -> usize
where
    I: IntoIterator<Item = &'a Position>,
{
    let mut distinct: heapless::Vec<Position, 8> = heapless::Vec::new();
    let limit = limit.min(distinct.capacity());

    for p in positions {
        if distinct.iter().all(|d| d.distance_to(p) > epsilon) {
            if distinct.push(*p).is_err() || distinct.len() >= limit {
                break;
            }
        }
    }
    distinct.len()
}
