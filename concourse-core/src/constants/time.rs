//! Time-Related Constants
//!
//! Conversion factors and the scheduling intervals used by the fusion tick,
//! calibration pass and drift check loops.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Minutes per hour.
pub const MINUTES_PER_HOUR: u64 = 60;

/// Hours per day.
pub const HOURS_PER_DAY: u64 = 24;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: u64 = MS_PER_SECOND * SECONDS_PER_MINUTE;

/// Milliseconds per hour.
pub const MS_PER_HOUR: u64 = MS_PER_MINUTE * MINUTES_PER_HOUR;

/// Milliseconds per day.
pub const MS_PER_DAY: u64 = MS_PER_HOUR * HOURS_PER_DAY;

// ===== SCHEDULING INTERVALS =====

/// Fusion tick period (milliseconds).
///
/// 10 Hz keeps the AR overlay responsive while leaving each tick far
/// inside its own budget.
///
/// Source: typical BLE advertising interval of 100 ms
pub const FUSION_TICK_INTERVAL_MS: u64 = 100;

/// Calibration pass period (milliseconds).
///
/// Beacons drift over days, so a pass every five minutes is plenty.
pub const CALIBRATION_PASS_INTERVAL_MS: u64 = 5 * MS_PER_MINUTE;

/// Drift check period (milliseconds).
pub const DRIFT_CHECK_INTERVAL_MS: u64 = MS_PER_MINUTE;
