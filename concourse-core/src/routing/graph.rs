//! Floor plan graph
//!
//! Arena layout: nodes and vertical transitions live in indexed `Vec`s and
//! walkways are adjacency lists of `(index, attributes)`. Walkways never
//! cross floors; the only way between floors is a [`VerticalTransition`],
//! which ties an entry node on one floor to an exit node on another.
//!
//! ```text
//!   L1   a ─── b ─── c ─── [elevator entry]
//!                                 ┃  transition
//!   L0   d ─── e ─── f ─── [elevator exit]
//! ```

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::errors::FloorPlanError;
use crate::geometry::{FloorId, Location, Position};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a node in the plan
pub type NodeIndex = usize;

/// Index of a vertical transition in the plan
pub type TransitionIndex = usize;

/// What a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    Waypoint,
    PointOfInterest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub location: Location,
    pub kind: NodeKind,
    pub label: Option<String>,
    /// Start/end locations may only snap to walkable nodes
    pub walkable: bool,
}

/// Walkway attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walkway {
    /// Length in metres; defaults to the straight-line distance
    pub distance: Option<f64>,
    /// Step-free
    pub accessible: bool,
    /// 0 (empty) to 100 (packed)
    pub crowd_level: u8,
}

impl Default for Walkway {
    fn default() -> Self {
        Self {
            distance: None,
            accessible: true,
            crowd_level: 0,
        }
    }
}

impl Walkway {
    pub fn with_distance(mut self, metres: f64) -> Self {
        self.distance = Some(metres);
        self
    }

    pub fn inaccessible(mut self) -> Self {
        self.accessible = false;
        self
    }

    pub fn with_crowd_level(mut self, level: u8) -> Self {
        self.crowd_level = level.min(100);
        self
    }
}

/// Directed half of a walkway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub to: NodeIndex,
    pub distance: f64,
    pub accessible: bool,
    pub crowd_level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransitionKind {
    Elevator,
    Escalator,
    Stairs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperationalStatus {
    Operational,
    Maintenance,
    Closed,
}

/// Accessibility equipment of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccessibilityFeatures {
    /// Usable from a wheelchair without steps
    pub step_free: bool,
    pub audio_announcements: bool,
    pub tactile_controls: bool,
}

impl AccessibilityFeatures {
    pub fn step_free() -> Self {
        Self {
            step_free: true,
            ..Self::default()
        }
    }

    pub fn any(&self) -> bool {
        self.step_free || self.audio_announcements || self.tactile_controls
    }
}

/// Elevator, escalator or staircase between two floors
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalTransition {
    pub id: String,
    pub kind: TransitionKind,
    pub start_floor: FloorId,
    pub end_floor: FloorId,
    /// Where the transition is, on the start floor
    pub position: Position,
    /// Node on the start floor
    pub entry: NodeIndex,
    /// Node on the end floor
    pub exit: NodeIndex,
    /// Usable end → start as well
    pub bidirectional: bool,
    pub status: OperationalStatus,
    pub crowd_level: Option<u8>,
    pub accessibility: Option<AccessibilityFeatures>,
}

impl VerticalTransition {
    /// Wheelchair-usable: flagged step-free, whatever the kind
    pub fn is_step_free(&self) -> bool {
        self.accessibility.map_or(false, |a| a.step_free)
    }

    /// Floors spanned
    pub fn floor_span(&self) -> u32 {
        (i32::from(self.end_floor.0) - i32::from(self.start_floor.0)).unsigned_abs()
    }

    /// Floor reached when boarding on `from`, honouring direction
    pub fn destination_from(&self, from: FloorId) -> Option<FloorId> {
        if from == self.start_floor {
            Some(self.end_floor)
        } else if self.bidirectional && from == self.end_floor {
            Some(self.start_floor)
        } else {
            None
        }
    }
}

/// Description of a transition for [`FloorPlanBuilder::add_transition`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSpec {
    pub id: String,
    pub kind: TransitionKind,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
    pub bidirectional: bool,
    pub status: OperationalStatus,
    pub crowd_level: Option<u8>,
    pub accessibility: Option<AccessibilityFeatures>,
}

impl TransitionSpec {
    /// Operational, bidirectional transition with no extra data
    pub fn new(id: impl Into<String>, kind: TransitionKind, entry: NodeIndex, exit: NodeIndex) -> Self {
        Self {
            id: id.into(),
            kind,
            entry,
            exit,
            bidirectional: true,
            status: OperationalStatus::Operational,
            crowd_level: None,
            accessibility: None,
        }
    }

    pub fn one_way(mut self) -> Self {
        self.bidirectional = false;
        self
    }

    pub fn with_status(mut self, status: OperationalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_crowd_level(mut self, level: u8) -> Self {
        self.crowd_level = Some(level.min(100));
        self
    }

    pub fn with_accessibility(mut self, features: AccessibilityFeatures) -> Self {
        self.accessibility = Some(features);
        self
    }
}

/// In-memory walkable graph of a building
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorPlan {
    nodes: Vec<Node>,
    edges: Vec<Vec<Edge>>,
    transitions: Vec<VerticalTransition>,
    floors: BTreeSet<FloorId>,
}

impl FloorPlan {
    pub fn builder() -> FloorPlanBuilder {
        FloorPlanBuilder::default()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges_from(&self, index: NodeIndex) -> &[Edge] {
        self.edges.get(index).map_or(&[][..], Vec::as_slice)
    }

    pub fn transition(&self, index: TransitionIndex) -> Option<&VerticalTransition> {
        self.transitions.get(index)
    }

    pub fn transitions(&self) -> &[VerticalTransition] {
        &self.transitions
    }

    pub fn transition_index(&self, id: &str) -> Option<TransitionIndex> {
        self.transitions.iter().position(|t| t.id == id)
    }

    pub fn floors(&self) -> impl Iterator<Item = FloorId> + '_ {
        self.floors.iter().copied()
    }

    /// Closest walkable node on the location's floor; ties go to the lower index
    pub fn nearest_walkable(&self, location: &Location) -> Option<NodeIndex> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            if !node.walkable || node.location.floor != location.floor {
                continue;
            }
            let d = node.location.position.distance_to(&location.position);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((index, d));
            }
        }
        best.map(|(index, _)| index)
    }
}

/// Incremental [`FloorPlan`] construction with consistency checks
#[derive(Debug, Default)]
pub struct FloorPlanBuilder {
    plan: FloorPlan,
}

impl FloorPlanBuilder {
    /// Adds a walkable node
    pub fn add_node(&mut self, id: impl Into<String>, location: Location, kind: NodeKind) -> NodeIndex {
        self.push_node(Node {
            id: id.into(),
            location,
            kind,
            label: None,
            walkable: true,
        })
    }

    /// Adds a labelled point of interest
    pub fn add_point_of_interest(
        &mut self,
        id: impl Into<String>,
        location: Location,
        label: impl Into<String>,
    ) -> NodeIndex {
        self.push_node(Node {
            id: id.into(),
            location,
            kind: NodeKind::PointOfInterest,
            label: Some(label.into()),
            walkable: true,
        })
    }

    /// Adds a node that routes pass through but never start or end at
    pub fn add_passage_node(&mut self, id: impl Into<String>, location: Location) -> NodeIndex {
        self.push_node(Node {
            id: id.into(),
            location,
            kind: NodeKind::Waypoint,
            label: None,
            walkable: false,
        })
    }

    fn push_node(&mut self, node: Node) -> NodeIndex {
        self.plan.floors.insert(node.location.floor);
        self.plan.nodes.push(node);
        self.plan.edges.push(Vec::new());
        self.plan.nodes.len() - 1
    }

    /// Connects two nodes on the same floor in both directions
    pub fn connect(&mut self, a: NodeIndex, b: NodeIndex, walkway: Walkway) -> Result<(), FloorPlanError> {
        let (la, lb) = (self.location(a)?, self.location(b)?);
        if la.floor != lb.floor {
            return Err(FloorPlanError::FloorMismatch);
        }

        let distance = walkway
            .distance
            .unwrap_or_else(|| la.position.distance_to(&lb.position));
        let edge = |to| Edge {
            to,
            distance,
            accessible: walkway.accessible,
            crowd_level: walkway.crowd_level,
        };
        self.plan.edges[a].push(edge(b));
        self.plan.edges[b].push(edge(a));
        Ok(())
    }

    /// Connects consecutive nodes with default walkways
    pub fn connect_path(&mut self, nodes: &[NodeIndex]) -> Result<(), FloorPlanError> {
        for pair in nodes.windows(2) {
            self.connect(pair[0], pair[1], Walkway::default())?;
        }
        Ok(())
    }

    /// Adds a vertical transition from `spec.entry`'s floor to `spec.exit`'s floor
    pub fn add_transition(&mut self, spec: TransitionSpec) -> Result<TransitionIndex, FloorPlanError> {
        let entry = self.location(spec.entry)?;
        let exit = self.location(spec.exit)?;
        if entry.floor == exit.floor {
            return Err(FloorPlanError::SameFloorTransition);
        }

        self.plan.transitions.push(VerticalTransition {
            id: spec.id,
            kind: spec.kind,
            start_floor: entry.floor,
            end_floor: exit.floor,
            position: entry.position,
            entry: spec.entry,
            exit: spec.exit,
            bidirectional: spec.bidirectional,
            status: spec.status,
            crowd_level: spec.crowd_level,
            accessibility: spec.accessibility,
        });
        Ok(self.plan.transitions.len() - 1)
    }

    pub fn build(self) -> FloorPlan {
        self.plan
    }

    fn location(&self, index: NodeIndex) -> Result<Location, FloorPlanError> {
        self.plan
            .nodes
            .get(index)
            .map(|n| n.location)
            .ok_or(FloorPlanError::UnknownNode { index })
    }
}
