//! Error Types for Positioning and Routing
//!
//! ## Taxonomy
//!
//! Not every failure is an `Err`. The engines distinguish:
//!
//! ### States (never returned as errors)
//! - Insufficient evidence: fusion holds its last position with decaying
//!   confidence.
//! - Floor ambiguity: fusion forces confidence to the minimum.
//! - Degenerate calibration: the beacon is skipped and the skip appears in the
//!   pass report as a [`CalibrationSkip`](crate::calibration::CalibrationSkip).
//! - Excessive drift: alert only, the update still goes through.
//!
//! ### Terminal failures
//! - [`RouteError`]: the request cannot be satisfied. Each bound has its own
//!   variant so callers can tell "no route exists" from "a route exists but
//!   violates the limits". Routes are never truncated to fit.
//! - [`ConfigError`]: a configuration value is out of range.
//! - [`FeedError`]: an input feed is closed or produced garbage.
//! - [`FloorPlanError`]: the floor plan builder was given inconsistent input.
//!
//! All errors are small and `Copy`; none allocate.
//!
//! ```rust
//! use concourse_core::RouteError;
//!
//! fn describe(err: RouteError) -> &'static str {
//!     match err {
//!         RouteError::NoPathFound => "no connected route",
//!         RouteError::PathTooLong { .. } => "route exceeds the point budget",
//!         RouteError::TooManyTransitions { .. } => "too many floor changes",
//!         RouteError::UnknownLocation => "location is not on the floor plan",
//!     }
//! }
//!
//! assert_eq!(describe(RouteError::NoPathFound), "no connected route");
//! ```

use thiserror_no_std::Error;

/// Result type for route computation
pub type RouteResult<T> = Result<T, RouteError>;

/// Route computation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// No connected route satisfies the request constraints
    #[error("No path found between the requested locations")]
    NoPathFound,

    /// The assembled route has more points than allowed
    #[error("Route has {length} points, limit is {max}")]
    PathTooLong {
        /// Points in the assembled route
        length: usize,
        /// Configured maximum
        max: usize,
    },

    /// The route needs more floor changes than allowed
    #[error("Route needs {count} floor changes, limit is {max}")]
    TooManyTransitions {
        /// Floor changes needed by the best available chain
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Start or end could not be placed on a walkable node of its floor
    #[error("Location is not on a known floor")]
    UnknownLocation,
}

/// Invalid configuration values
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Numeric parameter outside its accepted range
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// Parameter that must be non-zero was zero
    #[error("{name} must be greater than zero")]
    Zero {
        /// Parameter name
        name: &'static str,
    },
}

/// Input feed failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedError {
    /// The feed will produce no more items
    #[error("Feed closed")]
    Closed,

    /// The producer delivered an unreadable record
    #[error("Malformed record: {reason}")]
    Malformed {
        /// What was wrong with it
        reason: &'static str,
    },
}

/// Floor plan construction failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorPlanError {
    /// Node index does not exist
    #[error("Unknown node index {index}")]
    UnknownNode {
        /// Offending index
        index: usize,
    },

    /// Walkway endpoints on different floors
    #[error("Walkway endpoints are on different floors")]
    FloorMismatch,

    /// Transition entry/exit nodes not on its start/end floors
    #[error("Transition endpoints do not match its floors")]
    TransitionFloorMismatch,

    /// Transition starts and ends on the same floor
    #[error("Transition must connect two different floors")]
    SameFloorTransition,
}

impl ConfigError {
    /// Checks `value ∈ [min, max]`
    pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), Self> {
        if value.is_finite() && value >= min && value <= max {
            Ok(())
        } else {
            Err(Self::OutOfRange { name, value, min, max })
        }
    }

    /// Checks `value > 0`
    pub fn check_nonzero(name: &'static str, value: u64) -> Result<(), Self> {
        if value == 0 {
            Err(Self::Zero { name })
        } else {
            Ok(())
        }
    }
}
