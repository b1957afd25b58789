//! Time management for the positioning core
//!
//! Every engine reads time through a [`TimeSource`] instead of calling the
//! system clock directly. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] forward explicitly so that fusion ticks, sample eviction
//! and calibration intervals can be exercised without real waiting.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::constants::time::MS_PER_HOUR;

/// Timestamp in milliseconds since epoch (or since start for monotonic sources)
pub type Timestamp = u64;

/// Source of time for the engines
///
/// Implementations must be cheap to call; the fusion tick reads the clock
/// ten times a second per tracked subject.
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Manually driven clock for tests and replay
///
/// Uses an atomic so one clock can be shared (behind an `Arc`) between an
/// engine and the test that advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    timestamp: AtomicU64,
}

impl ManualClock {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.timestamp.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

impl<T: TimeSource + ?Sized> TimeSource for alloc::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn is_wall_clock(&self) -> bool {
        (**self).is_wall_clock()
    }
}

/// Milliseconds elapsed from `earlier` to `later`, zero if the clock went backwards
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

/// Elapsed time expressed in (fractional) hours
pub fn elapsed_hours(earlier: Timestamp, later: Timestamp) -> f64 {
    elapsed_ms(earlier, later) as f64 / MS_PER_HOUR as f64
}
