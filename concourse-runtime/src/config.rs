//! Service configuration
//!
//! One JSON document configures every service. Every field has a default, so
//! `{}` is a valid configuration and partial documents only override what
//! they name:
//!
//! ```json
//! {
//!   "tick_interval_ms": 200,
//!   "fusion": { "beacon_max_age_ms": 4000 },
//!   "routing": { "max_transitions": 2 }
//! }
//! ```

use std::time::Duration;

use concourse_core::calibration::CalibrationConfig;
use concourse_core::constants::time::{CALIBRATION_PASS_INTERVAL_MS, DRIFT_CHECK_INTERVAL_MS, FUSION_TICK_INTERVAL_MS};
use concourse_core::errors::ConfigError;
use concourse_core::fusion::FusionConfig;
use concourse_core::routing::RouteConfig;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;

/// Queued sample batches between tracking and calibration
pub const DEFAULT_SAMPLE_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub fusion: FusionConfig,
    pub calibration: CalibrationConfig,
    pub routing: RouteConfig,
    /// Fusion tick period per subject
    pub tick_interval_ms: u64,
    pub calibration_pass_interval_ms: u64,
    pub drift_check_interval_ms: u64,
    /// Sample batches buffered before new ones are dropped
    pub sample_queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            calibration: CalibrationConfig::default(),
            routing: RouteConfig::default(),
            tick_interval_ms: FUSION_TICK_INTERVAL_MS,
            calibration_pass_interval_ms: CALIBRATION_PASS_INTERVAL_MS,
            drift_check_interval_ms: DRIFT_CHECK_INTERVAL_MS,
            sample_queue_capacity: DEFAULT_SAMPLE_QUEUE_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Parses and validates a JSON document
    pub fn from_json(text: &str) -> RuntimeResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fusion.validate()?;
        self.calibration.validate()?;
        self.routing.validate()?;
        ConfigError::check_nonzero("tick_interval_ms", self.tick_interval_ms)?;
        ConfigError::check_nonzero("calibration_pass_interval_ms", self.calibration_pass_interval_ms)?;
        ConfigError::check_nonzero("drift_check_interval_ms", self.drift_check_interval_ms)?;
        ConfigError::check_nonzero("sample_queue_capacity", self.sample_queue_capacity as u64)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn calibration_pass_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_pass_interval_ms)
    }

    pub fn drift_check_interval(&self) -> Duration {
        Duration::from_millis(self.drift_check_interval_ms)
    }
}
