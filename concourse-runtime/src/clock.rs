//! Clock backed by the tokio timer
//!
//! Services run their loops on `tokio::time`, so the engines read the same
//! timer: under a paused test runtime, `tokio::time::advance` moves both the
//! schedule and the timestamps the engines see.

use concourse_core::time::{TimeSource, Timestamp};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
    base: Timestamp,
}

impl TokioClock {
    /// Starts counting from `base` milliseconds
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            base,
        }
    }

    /// Starts from the current wall-clock time
    pub fn from_system() -> Self {
        Self::starting_at(concourse_core::time::SystemClock.now())
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> Timestamp {
        self.base + self.origin.elapsed().as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_time() {
        let clock = TokioClock::starting_at(5_000);
        assert_eq!(clock.now(), 5_000);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now(), 6_500);
    }
}
