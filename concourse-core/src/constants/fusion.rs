//! Fusion Algorithm Constants
//!
//! Parameters for weighted multilateration, pose blending and confidence
//! scoring in the position fusion engine.

// ===== BEACON EVIDENCE =====

/// Minimum number of live beacons required for a multilateration fix.
///
/// Three ranges pin down a point in the horizontal plane. With fewer the
/// engine holds its previous estimate.
///
/// Source: Trilateration geometry
pub const MIN_BEACONS_FOR_FIX: usize = 3;

/// Beacon count at which beacon-derived confidence saturates at 1.0.
///
/// Confidence on the beacon path is `min(1, count / 5)`.
pub const BEACONS_FOR_FULL_CONFIDENCE: usize = 5;

/// Maximum age of a beacon observation used for fusion (milliseconds).
///
/// BLE RSSI is highly position dependent; a five second old range says
/// little about where a walking passenger is now.
pub const BEACON_MAX_AGE_MS: u64 = 5000;

/// Maximum number of live observations retained per subject.
///
/// Dense concourses rarely expose more than a dozen beacons to one phone.
pub const MAX_LIVE_OBSERVATIONS: usize = 32;

/// Smallest measured distance accepted (metres).
///
/// Guards the `1/d²` weights against division by (near) zero.
pub const MIN_RANGE_M: f64 = 0.05;

// ===== POSE BLENDING =====

/// Minimum pose confidence for a pose to be applied at all.
///
/// Lower-confidence poses are ignored entirely, not partially blended.
pub const POSE_TRUST_THRESHOLD: f32 = 0.7;

/// Default blend factor for trusted poses.
///
/// `new = α·pose + (1−α)·previous`.
pub const DEFAULT_POSE_BLEND: f64 = 0.7;

/// Maximum age of a pose estimate still treated as fresh (milliseconds).
pub const POSE_MAX_AGE_MS: u64 = 1000;

/// Per-tick confidence factor on the pose-only path.
///
/// Must stay at or below 1.0 so pose-only confidence never improves.
pub const POSE_ONLY_DECAY: f32 = 0.95;

// ===== HOLD / DECAY =====

/// Confidence half-life while holding a position without evidence (milliseconds).
pub const HOLD_CONFIDENCE_HALF_LIFE_MS: u64 = 10_000;

// ===== ADAPTIVE GAIN =====

/// Process noise added per second in the adaptive (Kalman) gain mode (m²/s).
pub const ADAPTIVE_PROCESS_NOISE: f64 = 0.5;

/// Pose measurement variance at confidence 1.0 (m²).
pub const ADAPTIVE_POSE_VARIANCE: f64 = 0.25;

// ===== FIXED-POINT CONFIDENCE =====

/// Fixed-point scaling factor for u16 confidence values.
///
/// Maps floating point [0.0, 1.0] to integer [0, 65535].
pub const FIXED_POINT_SCALE: f32 = 65535.0;

/// Minimum confidence value in fixed-point representation (1%).
///
/// Used for the floor-ambiguous state.
pub const CONFIDENCE_MIN_FIXED: u16 = 655;

// ===== FLOOR RESOLUTION =====

/// How long a trusted pose keeps deciding the believed floor (milliseconds).
///
/// Afterwards the beacon majority floor takes over again.
pub const POSE_FLOOR_MEMORY_MS: u64 = 30_000;

// ===== MULTILATERATION =====

/// Default height of beacons above the tracked device (metres).
///
/// Subtracted from the weighted mean beacon height to place the device.
pub const DEFAULT_MOUNT_OFFSET_M: f64 = 0.0;

/// Default gain applied to a fresh beacon fix (1.0 replaces the estimate).
pub const DEFAULT_BEACON_GAIN: f64 = 1.0;

// ===== CALIBRATION FEEDBACK =====

/// Minimum fused confidence before live observations become calibration samples.
pub const SAMPLE_MIN_CONFIDENCE: f32 = 0.8;
