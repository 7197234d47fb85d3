//! Node tunables and their validation.
//!
//! Out-of-range values are rejected at startup so that the converter and the
//! watchdog never divide by zero or sleep for a negative interval at runtime.

use std::time::Duration;

use odom_types::OdomError;
use serde::{Deserialize, Serialize};

/// Immutable configuration of the odometry node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// Calibrated number of encoder ticks per metre travelled.
    pub ticks_per_meter: f64,
    /// Frame identifier stamped on every velocity message.
    pub frame_id: String,
    /// Fixed variance placed on the x-axis diagonal of the covariance.
    pub uncertainty_fixed: f64,
    /// Seconds of silence after which a zero velocity is published.
    pub deadline_timeout: f64,
}

fn default_ticks_per_meter() -> f64 {
    310.0
}
fn default_frame_id() -> String {
    "base_link".to_string()
}
fn default_uncertainty_fixed() -> f64 {
    1e-3
}
fn default_deadline_timeout() -> f64 {
    0.1
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            ticks_per_meter: default_ticks_per_meter(),
            frame_id: default_frame_id(),
            uncertainty_fixed: default_uncertainty_fixed(),
            deadline_timeout: default_deadline_timeout(),
        }
    }
}

impl OdometryConfig {
    /// Check every option against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::InvalidConfig`] naming the first offending option.
    pub fn validate(&self) -> Result<(), OdomError> {
        if !self.ticks_per_meter.is_finite() || self.ticks_per_meter <= 0.0 {
            return Err(OdomError::InvalidConfig(format!(
                "ticks_per_meter must be a finite number > 0, got {}",
                self.ticks_per_meter
            )));
        }
        if !self.uncertainty_fixed.is_finite() || self.uncertainty_fixed < 0.0 {
            return Err(OdomError::InvalidConfig(format!(
                "uncertainty_fixed must be a finite number >= 0, got {}",
                self.uncertainty_fixed
            )));
        }
        if self.frame_id.trim().is_empty() {
            return Err(OdomError::InvalidConfig(
                "frame_id must not be empty".to_string(),
            ));
        }
        self.deadline().map(|_| ())
    }

    /// The watchdog deadline as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::InvalidConfig`] when `deadline_timeout` is not a
    /// positive, finite, representable number of seconds.
    pub fn deadline(&self) -> Result<Duration, OdomError> {
        if !self.deadline_timeout.is_finite() || self.deadline_timeout <= 0.0 {
            return Err(OdomError::InvalidConfig(format!(
                "deadline_timeout must be a finite number of seconds > 0, got {}",
                self.deadline_timeout
            )));
        }
        Duration::try_from_secs_f64(self.deadline_timeout).map_err(|e| {
            OdomError::InvalidConfig(format!(
                "deadline_timeout {} is not representable: {e}",
                self.deadline_timeout
            ))
        })
    }
}
