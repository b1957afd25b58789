//! Runtime error type
//!
//! Core failures convert in through `#[from]`; everything a service can
//! refuse on its own gets a dedicated variant.

use concourse_core::errors::{ConfigError, FloorPlanError, RouteError};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by the runtime services
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration text could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Subject {0} is not tracked")]
    UnknownSubject(String),

    #[error("Subject {0} is already tracked")]
    AlreadyTracking(String),

    /// No transition in the floor plan has this id
    #[error("Unknown transition {0}")]
    UnknownTransition(String),

    /// The backing store rejected a write
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Floor plan error: {0}")]
    FloorPlan(#[from] FloorPlanError),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// The service has been shut down
    #[error("Service stopped")]
    Stopped,
}
