//! Multi-Floor Route Computation
//!
//! ## Overview
//!
//! Routes are computed over an in-memory [`FloorPlan`]. Walking on a floor is
//! a Dijkstra search; changing floors means riding one or more vertical
//! transitions, whose live status and crowding come from a
//! [`TransitionStatusSource`].
//!
//! ## Algorithm
//!
//! ```text
//! 1. snap start / end to the nearest walkable node on their floors
//! 2. same floor → Dijkstra, done
//! 3. enumerate transition chains start floor → end floor
//!    (operational only; step-free transitions only for wheelchairs)
//! 4. score chains, take the best `max_candidates` that assemble
//!    re-check status before assembling each candidate
//!    walk → ride → walk → … → walk, merging coincident points
//!    re-check status after assembly
//! 5. rank: goal metric / max(score, 0.05), ties on transition indices
//! 6. enforce max_path_length and max_transitions, never truncate
//! ```
//!
//! ## Example
//!
//! ```rust
//! use concourse_core::geometry::{FloorId, Location, Position};
//! use concourse_core::routing::graph::{FloorPlan, NodeKind};
//! use concourse_core::routing::{MultiFloorRouteEngine, RouteConfig, RouteRequest};
//!
//! let mut builder = FloorPlan::builder();
//! let at = |x| Location::new(Position::new(x, 0.0, 0.0), FloorId(0));
//! let a = builder.add_node("security", at(0.0), NodeKind::Waypoint);
//! let b = builder.add_node("gate-b4", at(40.0), NodeKind::PointOfInterest);
//! builder.connect_path(&[a, b]).unwrap();
//!
//! let engine = MultiFloorRouteEngine::new(builder.build(), RouteConfig::default()).unwrap();
//! let route = engine.compute_route(&RouteRequest::new(at(0.0), at(40.0))).unwrap();
//!
//! assert_eq!(route.points.len(), 2);
//! assert_eq!(route.floor_changes, 0);
//! assert!((route.total_distance - 40.0).abs() < 1e-9);
//! ```

pub mod dijkstra;
pub mod graph;
pub mod navigation;
pub mod transitions;

use alloc::vec::Vec;
use core::cmp::Ordering;

pub use dijkstra::{shortest_path, EdgePolicy, PathResult};
pub use graph::{FloorPlan, FloorPlanBuilder, NodeIndex, OperationalStatus, TransitionIndex, TransitionKind};
pub use navigation::{NavigationPoint, PointKind, PointMetadata, Route, TransitionInfo};
pub use transitions::{Chain, PlanStatus, TransitionStatusSource};

use crate::constants::routing::{
    DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_PATH_LENGTH, DEFAULT_MAX_TRANSITIONS, ELEVATOR_TIME_S, ESCALATOR_TIME_S,
    FLOOR_CHANGE_WEIGHT_M, MAX_CANDIDATES, MAX_CHAIN_TRANSITIONS, MIN_RANKING_SCORE, STAIRS_TIME_S, TRANSITION_DISTANCE_EQUIVALENT_M,
    WALKING_SPEED_M_PER_S,
};
use crate::errors::{ConfigError, RouteError, RouteResult};
use crate::geometry::Location;
use graph::{NodeKind, VerticalTransition};
use navigation::push_point;
use transitions::{enumerate_chains, score_chain};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What "best route" means for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OptimizationGoal {
    /// Least walking (each floor change counts as 10 m)
    #[default]
    Shortest,
    /// Least walking plus riding time
    Fastest,
    /// Fewest floor changes, then least walking
    FewestTransitions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RoutePreferences {
    pub avoid_crowded: bool,
    pub avoid_stairs: bool,
    pub prefer_elevators: bool,
    pub prefer_escalators: bool,
    pub wheelchair_accessible: bool,
    pub optimization_goal: OptimizationGoal,
}

impl RoutePreferences {
    pub fn wheelchair() -> Self {
        Self {
            wheelchair_accessible: true,
            avoid_stairs: true,
            prefer_elevators: true,
            ..Self::default()
        }
    }

    fn edge_policy(&self) -> EdgePolicy {
        EdgePolicy {
            step_free_only: self.wheelchair_accessible,
            avoid_crowded: self.avoid_crowded,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteRequest {
    pub start: Location,
    pub end: Location,
    pub preferences: RoutePreferences,
}

impl RouteRequest {
    pub fn new(start: Location, end: Location) -> Self {
        Self {
            start,
            end,
            preferences: RoutePreferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: RoutePreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

/// Route bounds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouteConfig {
    pub max_path_length: usize,
    pub max_transitions: usize,
    pub max_candidates: usize,
    /// Metres per second
    pub walking_speed: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            walking_speed: WALKING_SPEED_M_PER_S,
        }
    }
}

impl RouteConfig {
    pub fn with_max_path_length(mut self, max: usize) -> Self {
        self.max_path_length = max;
        self
    }

    pub fn with_max_transitions(mut self, max: usize) -> Self {
        self.max_transitions = max;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_nonzero("max_path_length", self.max_path_length as u64)?;
        ConfigError::check_range("max_transitions", self.max_transitions as f64, 0.0, MAX_CHAIN_TRANSITIONS as f64)?;
        ConfigError::check_range("max_candidates", self.max_candidates as f64, 1.0, MAX_CANDIDATES as f64)?;
        ConfigError::check_range("walking_speed", self.walking_speed, 0.1, 10.0)
    }
}

/// Fully assembled candidate before final validation
struct Candidate {
    route: Route,
    chain: Chain,
    rank: f64,
}

/// Computes walking routes across floors
#[derive(Debug, Clone)]
pub struct MultiFloorRouteEngine {
    plan: FloorPlan,
    config: RouteConfig,
}

impl MultiFloorRouteEngine {
    pub fn new(plan: FloorPlan, config: RouteConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { plan, config })
    }

    pub fn plan(&self) -> &FloorPlan {
        &self.plan
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Computes a route using the status recorded in the floor plan
    pub fn compute_route(&self, request: &RouteRequest) -> RouteResult<Route> {
        self.compute_route_with_status(request, &PlanStatus)
    }

    /// Computes a route against live transition status
    pub fn compute_route_with_status<S>(&self, request: &RouteRequest, status: &S) -> RouteResult<Route>
    where
        S: TransitionStatusSource + ?Sized,
    {
        let start = self
            .plan
            .nearest_walkable(&request.start)
            .ok_or(RouteError::UnknownLocation)?;
        let end = self
            .plan
            .nearest_walkable(&request.end)
            .ok_or(RouteError::UnknownLocation)?;

        let preferences = &request.preferences;
        let policy = preferences.edge_policy();

        if request.start.floor == request.end.floor {
            let path = shortest_path(&self.plan, start, end, policy).ok_or(RouteError::NoPathFound)?;
            let mut points = Vec::with_capacity(path.path.len());
            self.push_walk(&mut points, &path);
            let route = Route {
                points,
                total_distance: path.distance,
                estimated_time: path.distance / self.config.walking_speed,
                floor_changes: 0,
            };
            return self.enforce_bounds(route);
        }

        let usable = |t: &VerticalTransition| {
            status.status(t) == OperationalStatus::Operational
                && (!preferences.wheelchair_accessible || t.is_step_free())
        };
        let chains = enumerate_chains(
            &self.plan,
            request.start.floor,
            request.end.floor,
            MAX_CHAIN_TRANSITIONS,
            usable,
        );

        let (within, beyond): (Vec<Chain>, Vec<Chain>) = chains
            .into_iter()
            .partition(|chain| chain.len() <= self.config.max_transitions);

        if within.is_empty() {
            return Err(match beyond.iter().map(|c| c.len()).min() {
                Some(count) => RouteError::TooManyTransitions {
                    count,
                    max: self.config.max_transitions,
                },
                None => RouteError::NoPathFound,
            });
        }

        let mut scored: Vec<(f64, Chain)> = within
            .into_iter()
            .map(|chain| (score_chain(&self.plan, &chain, status, preferences), chain))
            .collect();
        scored.sort_by(|(sa, ca), (sb, cb)| sb.total_cmp(sa).then_with(|| compare_chains(ca, cb)));

        let mut candidates: Vec<Candidate> = Vec::new();
        for (score, chain) in scored {
            if candidates.len() >= self.config.max_candidates {
                break;
            }

            if !self.chain_operational(&chain, status) {
                log_debug!("candidate chain dropped: transition closed before assembly");
                continue;
            }

            let route = match self.assemble(start, end, &chain, policy) {
                Some(route) => route,
                None => continue,
            };

            if !self.chain_operational(&chain, status) {
                log_debug!("candidate chain dropped: transition closed during assembly");
                continue;
            }

            let rank = self.goal_metric(&route, preferences.optimization_goal) / score.max(MIN_RANKING_SCORE);
            candidates.push(Candidate { route, chain, rank });
        }

        candidates.sort_by(|a, b| a.rank.total_cmp(&b.rank).then_with(|| compare_chains(&a.chain, &b.chain)));

        let mut first_violation = None;
        for candidate in candidates {
            match self.enforce_bounds(candidate.route) {
                Ok(route) => return Ok(route),
                Err(err) => {
                    first_violation.get_or_insert(err);
                }
            }
        }
        Err(first_violation.unwrap_or(RouteError::NoPathFound))
    }

    fn chain_operational<S>(&self, chain: &Chain, status: &S) -> bool
    where
        S: TransitionStatusSource + ?Sized,
    {
        chain.iter().all(|hop| {
            self.plan
                .transition(hop.transition)
                .map_or(false, |t| status.status(t) == OperationalStatus::Operational)
        })
    }

    /// Walk → ride → walk … for one chain; `None` if a walk is impossible
    fn assemble(&self, start: NodeIndex, end: NodeIndex, chain: &Chain, policy: EdgePolicy) -> Option<Route> {
        let mut points = Vec::new();
        let mut distance = 0.0;
        let mut ride_time = 0.0;
        let mut current = start;

        for hop in chain {
            let transition = self.plan.transition(hop.transition)?;
            let (board, alight) = if hop.from == transition.start_floor {
                (transition.entry, transition.exit)
            } else {
                (transition.exit, transition.entry)
            };

            let walk = shortest_path(&self.plan, current, board, policy)?;
            distance += walk.distance;
            self.push_walk(&mut points, &walk);

            let board_location = self.plan.node(board)?.location;
            push_point(
                &mut points,
                NavigationPoint {
                    location: board_location,
                    kind: PointKind::VerticalTransition,
                    metadata: PointMetadata {
                        node_id: Some(self.plan.node(board)?.id.clone()),
                        label: None,
                        transition: Some(TransitionInfo {
                            id: transition.id.clone(),
                            kind: transition.kind,
                            from_floor: hop.from,
                            to_floor: hop.to,
                        }),
                    },
                },
            );
            ride_time += ride_seconds(transition);
            current = alight;
        }

        let walk = shortest_path(&self.plan, current, end, policy)?;
        distance += walk.distance;
        self.push_walk(&mut points, &walk);

        Some(Route {
            points,
            total_distance: distance,
            estimated_time: distance / self.config.walking_speed + ride_time,
            floor_changes: chain.len(),
        })
    }

    fn push_walk(&self, points: &mut Vec<NavigationPoint>, walk: &PathResult) {
        for &index in &walk.path {
            if let Some(node) = self.plan.node(index) {
                let kind = match node.kind {
                    NodeKind::Waypoint => PointKind::Waypoint,
                    NodeKind::PointOfInterest => PointKind::PointOfInterest,
                };
                push_point(
                    points,
                    NavigationPoint {
                        location: node.location,
                        kind,
                        metadata: PointMetadata {
                            node_id: Some(node.id.clone()),
                            label: node.label.clone(),
                            transition: None,
                        },
                    },
                );
            }
        }
    }

    fn goal_metric(&self, route: &Route, goal: OptimizationGoal) -> f64 {
        match goal {
            OptimizationGoal::Shortest => {
                route.total_distance + route.floor_changes as f64 * TRANSITION_DISTANCE_EQUIVALENT_M
            }
            OptimizationGoal::Fastest => route.estimated_time,
            OptimizationGoal::FewestTransitions => {
                route.floor_changes as f64 * FLOOR_CHANGE_WEIGHT_M + route.total_distance
            }
        }
    }

    fn enforce_bounds(&self, route: Route) -> RouteResult<Route> {
        if route.points.len() > self.config.max_path_length {
            return Err(RouteError::PathTooLong {
                length: route.points.len(),
                max: self.config.max_path_length,
            });
        }
        if route.floor_changes > self.config.max_transitions {
            return Err(RouteError::TooManyTransitions {
                count: route.floor_changes,
                max: self.config.max_transitions,
            });
        }
        Ok(route)
    }
}

/// Expected ride time including waiting, seconds
fn ride_seconds(transition: &VerticalTransition) -> f64 {
    let floors = f64::from(transition.floor_span().max(1));
    match transition.kind {
        TransitionKind::Elevator => ELEVATOR_TIME_S,
        TransitionKind::Escalator => ESCALATOR_TIME_S * floors,
        TransitionKind::Stairs => STAIRS_TIME_S * floors,
    }
}

/// Lexicographic order on transition indices, shorter chains first on a shared prefix
fn compare_chains(a: &Chain, b: &Chain) -> Ordering {
    a.iter()
        .map(|h| h.transition)
        .cmp(b.iter().map(|h| h.transition))
}
