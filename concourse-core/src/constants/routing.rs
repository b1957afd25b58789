//! Routing Constants
//!
//! Transition scoring weights, route bounds and walking-time estimates.

// ===== ROUTE BOUNDS =====

/// Default maximum number of navigation points in a route.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 500;

/// Default maximum number of floor changes in a route.
pub const DEFAULT_MAX_TRANSITIONS: usize = 3;

/// Hard upper bound on transitions in one chain.
///
/// Sizes the inline chain storage; configured limits are clamped to it.
pub const MAX_CHAIN_TRANSITIONS: usize = 8;

/// Default number of top-scoring transition chains fully evaluated.
pub const DEFAULT_MAX_CANDIDATES: usize = 3;

/// Hard upper bound on candidate chains evaluated per request.
pub const MAX_CANDIDATES: usize = 16;

/// Cap on chains enumerated before scoring.
///
/// Airports have a handful of floors; this only guards pathological plans.
pub const MAX_ENUMERATED_CHAINS: usize = 256;

// ===== TRANSITION SCORING =====

/// Base score of an operational transition.
pub const BASE_TRANSITION_SCORE: f64 = 1.0;

/// Crowd penalty weight applied to `crowd_level / 100`.
pub const CROWD_PENALTY_WEIGHT: f64 = 0.3;

/// Crowd penalty weight when the requester avoids crowds.
pub const AVOID_CROWD_PENALTY_WEIGHT: f64 = 0.6;

/// Bonus for an elevator when elevators are preferred.
pub const PREFERRED_KIND_BONUS: f64 = 0.2;

/// Bonus when the transition advertises accessibility features.
pub const ACCESSIBILITY_BONUS: f64 = 0.1;

/// Penalty for stairs when the requester avoids stairs.
pub const STAIRS_AVOIDANCE_PENALTY: f64 = 0.5;

/// Floor on the score used as a divisor when ranking candidates.
pub const MIN_RANKING_SCORE: f64 = 0.05;

// ===== EDGE COSTS =====

/// Extra cost multiplier per unit of `crowd_level / 100` on crowded edges.
pub const CROWDED_EDGE_MULTIPLIER: f64 = 1.0;

// ===== TIME ESTIMATES =====

/// Average walking speed (metres per second).
///
/// Source: pedestrian flow studies for terminals with luggage
pub const WALKING_SPEED_M_PER_S: f64 = 1.2;

/// Expected elevator time including wait (seconds).
pub const ELEVATOR_TIME_S: f64 = 45.0;

/// Expected escalator ride time per floor (seconds).
pub const ESCALATOR_TIME_S: f64 = 25.0;

/// Expected stair climb time per floor (seconds).
pub const STAIRS_TIME_S: f64 = 30.0;

/// Equivalent walking distance charged per transition for the `Shortest` goal (metres).
pub const TRANSITION_DISTANCE_EQUIVALENT_M: f64 = 10.0;

/// Distance charged per floor change for the `FewestTransitions` goal (metres).
///
/// Larger than any terminal walk, so floor changes are compared first.
pub const FLOOR_CHANGE_WEIGHT_M: f64 = 1000.0;
