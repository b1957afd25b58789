//! Constants for the Concourse positioning core
//!
//! Centralised, documented tuning values used throughout the engines.
//! Numeric values carry their unit in the name.
//!
//! ## Organization
//!
//! - **Time**: conversions and scheduling intervals
//! - **Fusion**: multilateration, pose blending and confidence
//! - **Calibration**: sample retention, path loss and drift
//! - **Routing**: transition scoring, bounds and timing

/// Time-related constants for intervals and conversions.
pub mod time;

/// Fusion algorithm parameters and thresholds.
pub mod fusion;

/// Beacon calibration and drift parameters.
pub mod calibration;

/// Route computation parameters and limits.
pub mod routing;

// Re-export commonly used constants for convenience
pub use time::{MS_PER_SECOND, MS_PER_MINUTE, MS_PER_HOUR, MS_PER_DAY, FUSION_TICK_INTERVAL_MS};

pub use fusion::{
    MIN_BEACONS_FOR_FIX, BEACONS_FOR_FULL_CONFIDENCE, BEACON_MAX_AGE_MS,
    POSE_TRUST_THRESHOLD, DEFAULT_POSE_BLEND,
};

pub use calibration::{
    SAMPLE_CAPACITY, SAMPLE_MAX_AGE_MS, MIN_SAMPLES_FOR_CALIBRATION,
    DEFAULT_TX_POWER_DBM, DEFAULT_PATH_LOSS_EXPONENT,
};

pub use routing::{DEFAULT_MAX_PATH_LENGTH, DEFAULT_MAX_TRANSITIONS, DEFAULT_MAX_CANDIDATES};
