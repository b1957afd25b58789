//! Calibration Constants
//!
//! Sample retention, eligibility thresholds, the log-distance path-loss
//! model and drift alerting parameters.

use super::time::{MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE};

// ===== SAMPLE RETENTION =====

/// Ring buffer capacity for calibration samples per beacon.
pub const SAMPLE_CAPACITY: usize = 100;

/// Maximum sample age retained for calibration (milliseconds).
pub const SAMPLE_MAX_AGE_MS: u64 = MS_PER_DAY;

/// Minimum retained samples before a beacon may be recalibrated.
pub const MIN_SAMPLES_FOR_CALIBRATION: usize = 10;

/// Minimum number of distinct sample positions for a usable solve.
pub const MIN_INDEPENDENT_SAMPLES: usize = 3;

/// Two sample positions closer than this count as the same point (metres).
pub const DISTINCT_POSITION_EPSILON_M: f64 = 0.01;

/// Default minimum time between calibrations of one beacon (milliseconds).
pub const DEFAULT_CALIBRATION_INTERVAL_MS: u64 = 30 * MS_PER_MINUTE;

// ===== PATH-LOSS MODEL =====

/// Default transmit power: RSSI measured at 1 m (dBm).
///
/// Source: iBeacon "measured power" convention
pub const DEFAULT_TX_POWER_DBM: f64 = -59.0;

/// Default path-loss exponent for airport interiors.
///
/// 2.0 is free space; large open halls with crowds sit around 2–3.
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.5;

// ===== GEOMETRY =====

/// Minimum normalised determinant of the normal matrix.
///
/// Below this the sample positions are treated as collinear and the solve
/// is skipped. The determinant is normalised by the squared trace so the
/// check is scale free.
pub const MIN_GEOMETRY_CONDITION: f64 = 1e-3;

// ===== DRIFT =====

/// Rolling window of drift history (milliseconds).
pub const DRIFT_WINDOW_MS: u64 = MS_PER_DAY;

/// Ring buffer capacity for drift records per beacon.
pub const DRIFT_HISTORY_CAPACITY: usize = 64;

/// Half-life of the recency weight applied to drift records (milliseconds).
pub const DRIFT_RECENCY_HALF_LIFE_MS: u64 = 6 * MS_PER_HOUR;

/// Default drift rate above which an alert is raised (metres per hour).
pub const DEFAULT_MAX_DRIFT_PER_HOUR_M: f64 = 0.5;

/// Default weighted drift magnitude reported by the drift check (metres).
pub const DEFAULT_DRIFT_ALERT_MAGNITUDE_M: f64 = 1.0;
