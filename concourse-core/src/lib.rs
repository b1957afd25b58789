//! Positioning core for indoor airport navigation
//!
//! Fuses beacon ranges with visual-inertial poses into one position per
//! subject, keeps the beacon survey honest by re-estimating beacon positions
//! from pose-anchored samples, and routes passengers across floors.
//!
//! Key constraints:
//! - `no_std` + `alloc`; `std` only adds the system clock and logging
//! - All time is read through a [`TimeSource`](time::TimeSource)
//! - Deterministic: ordered maps, stable tie-breaking, no randomness
//!
//! ```rust
//! use concourse_core::geometry::{FloorId, Location, Position};
//! use concourse_core::routing::graph::{FloorPlan, NodeKind, TransitionKind, TransitionSpec};
//! use concourse_core::routing::{MultiFloorRouteEngine, RouteConfig, RouteRequest};
//!
//! let at = |x, floor| Location::new(Position::new(x, 0.0, 0.0), FloorId(floor));
//! let mut plan = FloorPlan::builder();
//! let check_in = plan.add_node("check-in", at(0.0, 0), NodeKind::Waypoint);
//! let lift_low = plan.add_node("lift-l0", at(20.0, 0), NodeKind::Waypoint);
//! let lift_high = plan.add_node("lift-l1", at(20.0, 1), NodeKind::Waypoint);
//! let lounge = plan.add_node("lounge", at(35.0, 1), NodeKind::PointOfInterest);
//! plan.connect_path(&[check_in, lift_low]).unwrap();
//! plan.connect_path(&[lift_high, lounge]).unwrap();
//! plan.add_transition(TransitionSpec::new("lift-a", TransitionKind::Elevator, lift_low, lift_high))
//!     .unwrap();
//!
//! let engine = MultiFloorRouteEngine::new(plan.build(), RouteConfig::default()).unwrap();
//! let route = engine.compute_route(&RouteRequest::new(at(0.0, 0), at(35.0, 1))).unwrap();
//!
//! assert_eq!(route.floor_changes, 1);
//! assert!((route.total_distance - 35.0).abs() < 1e-9);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod beacon;
pub mod buffer;
pub mod calibration;
pub mod constants;
pub mod errors;
pub mod feed;
pub mod fusion;
pub mod geometry;
pub mod routing;
pub mod time;

// Public API
pub use beacon::{BeaconId, BeaconRecord, BeaconRegistry, SignalType};
pub use calibration::{CalibrationConfig, CalibrationEngine, CalibrationReport, CalibrationSkip, DriftAlert};
pub use errors::{ConfigError, FeedError, FloorPlanError, RouteError, RouteResult};
pub use fusion::{ConfidenceScore, EvidenceState, FusedPosition, FusionConfig, PositionFusionEngine, SubjectId};
pub use geometry::{FloorId, Location, Position};
pub use routing::{MultiFloorRouteEngine, Route, RouteConfig, RoutePreferences, RouteRequest};
pub use time::{ManualClock, TimeSource, Timestamp};

#[cfg(feature = "std")]
pub use time::SystemClock;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
