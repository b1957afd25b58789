//! Navigation points and assembled routes

use alloc::string::String;
use alloc::vec::Vec;

use super::graph::TransitionKind;
use crate::geometry::{FloorId, Location};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two points closer than this on the same floor are one point (metres)
pub const COINCIDENT_POINT_EPSILON_M: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointKind {
    Waypoint,
    VerticalTransition,
    PointOfInterest,
}

impl PointKind {
    /// Which kind survives when two points coincide
    fn precedence(self) -> u8 {
        match self {
            PointKind::VerticalTransition => 2,
            PointKind::PointOfInterest => 1,
            PointKind::Waypoint => 0,
        }
    }
}

/// Transition details carried by a vertical transition point
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransitionInfo {
    pub id: String,
    pub kind: TransitionKind,
    pub from_floor: FloorId,
    pub to_floor: FloorId,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointMetadata {
    /// Floor plan node the point came from
    pub node_id: Option<String>,
    pub label: Option<String>,
    pub transition: Option<TransitionInfo>,
}

/// One step of a route
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavigationPoint {
    pub location: Location,
    pub kind: PointKind,
    pub metadata: PointMetadata,
}

/// Walkable route between two locations
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    /// Never empty
    pub points: Vec<NavigationPoint>,
    /// Walked distance, metres
    pub total_distance: f64,
    /// Walking plus transition time, seconds
    pub estimated_time: f64,
    pub floor_changes: usize,
}

impl Route {
    /// Vertical transition points in order
    pub fn transition_points(&self) -> impl Iterator<Item = &NavigationPoint> {
        self.points
            .iter()
            .filter(|p| p.kind == PointKind::VerticalTransition)
    }
}

/// Appends a point, merging it with the last one when they coincide
///
/// The merged point keeps the higher-precedence kind
/// (transition > point of interest > waypoint) with its metadata.
pub fn push_point(points: &mut Vec<NavigationPoint>, point: NavigationPoint) {
    if let Some(last) = points.last_mut() {
        if last
            .location
            .coincides_with(&point.location, COINCIDENT_POINT_EPSILON_M)
        {
            if point.kind.precedence() > last.kind.precedence() {
                *last = point;
            }
            return;
        }
    }
    points.push(point);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;

    fn point(x: f64, floor: i16, kind: PointKind) -> NavigationPoint {
        NavigationPoint {
            location: Location::new(Position::new(x, 0.0, 0.0), FloorId(floor)),
            kind,
            metadata: PointMetadata::default(),
        }
    }

    #[test]
    fn coincident_points_merge_by_precedence() {
        let mut points = Vec::new();
        push_point(&mut points, point(0.0, 0, PointKind::Waypoint));
        push_point(&mut points, point(0.0, 0, PointKind::VerticalTransition));
        push_point(&mut points, point(0.0, 0, PointKind::Waypoint));

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].kind, PointKind::VerticalTransition);
    }

    #[test]
    fn same_xy_on_other_floor_is_kept() {
        let mut points = Vec::new();
        push_point(&mut points, point(0.0, 0, PointKind::VerticalTransition));
        push_point(&mut points, point(0.0, 1, PointKind::Waypoint));
        assert_eq!(points.len(), 2);
    }
}
