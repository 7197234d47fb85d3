//! In-process encoders for CI and headless runs without a motor attached.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use odom_hal::{EncoderSource, SimEncoder};
//!
//! let mut enc = SimEncoder::new("rear_motor", 310.0);
//! let sample = enc.read(Duration::from_millis(100)).unwrap().unwrap();
//! assert_eq!(sample.ticks, 31);
//! assert_eq!(sample.duration_us, 100_000);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use odom_types::{OdomError, SensorSample};
use tracing::trace;

use crate::encoder::EncoderSource;

// ────────────────────────────────────────────────────────────────────────────
// Constant-speed encoder
// ────────────────────────────────────────────────────────────────────────────

/// A simulated encoder turning at a constant tick rate.
///
/// Fractional ticks are carried over to the next read so the long-run
/// count matches the configured rate exactly.
pub struct SimEncoder {
    id: String,
    ticks_per_second: f64,
    carry: f64,
}

impl SimEncoder {
    /// `ticks_per_second` may be negative to simulate reverse motion.
    pub fn new(id: impl Into<String>, ticks_per_second: f64) -> Self {
        Self {
            id: id.into(),
            ticks_per_second,
            carry: 0.0,
        }
    }

    /// Change the simulated speed; takes effect on the next read.
    pub fn set_ticks_per_second(&mut self, ticks_per_second: f64) {
        self.ticks_per_second = ticks_per_second;
    }
}

impl EncoderSource for SimEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self, elapsed: Duration) -> Result<Option<SensorSample>, OdomError> {
        let exact = self.ticks_per_second * elapsed.as_secs_f64() + self.carry;
        let whole = exact.trunc();
        self.carry = exact - whole;
        let ticks = whole.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        let duration_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        trace!(encoder = %self.id, ticks, duration_us, "sim encoder read");
        Ok(Some(SensorSample::new(ticks, duration_us)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted encoder
// ────────────────────────────────────────────────────────────────────────────

/// Replays a fixed list of samples, ignoring the elapsed time, then reports
/// exhaustion.
pub struct ScriptedEncoder {
    id: String,
    samples: VecDeque<SensorSample>,
}

impl ScriptedEncoder {
    pub fn new(id: impl Into<String>, samples: impl IntoIterator<Item = SensorSample>) -> Self {
        Self {
            id: id.into(),
            samples: samples.into_iter().collect(),
        }
    }

    /// Number of samples not yet read.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl EncoderSource for ScriptedEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self, _elapsed: Duration) -> Result<Option<SensorSample>, OdomError> {
        Ok(self.samples.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_encoder_reports_elapsed_time() {
        let mut enc = SimEncoder::new("sim", 1000.0);
        let sample = enc.read(Duration::from_millis(20)).unwrap().unwrap();
        assert_eq!(sample, SensorSample::new(20, 20_000));
        assert_eq!(enc.id(), "sim");
    }

    #[test]
    fn sim_encoder_carries_fractional_ticks() {
        // Half a tick per read: 0, 1, 0, 1, 0 over five reads.
        let mut enc = SimEncoder::new("sim", 5.0);
        let total: i32 = (0..5)
            .map(|_| enc.read(Duration::from_millis(100)).unwrap().unwrap().ticks)
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn sim_encoder_runs_in_reverse() {
        let mut enc = SimEncoder::new("sim", -310.0);
        let sample = enc.read(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(sample.ticks, -310);
    }

    #[test]
    fn sim_encoder_speed_change_applies_next_read() {
        let mut enc = SimEncoder::new("sim", 100.0);
        enc.set_ticks_per_second(0.0);
        let sample = enc.read(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(sample.ticks, 0);
    }

    #[test]
    fn scripted_encoder_replays_then_exhausts() {
        let mut enc = ScriptedEncoder::new(
            "script",
            [SensorSample::new(1, 10), SensorSample::new(-2, 20)],
        );
        assert_eq!(enc.remaining(), 2);
        assert_eq!(enc.read(Duration::ZERO).unwrap(), Some(SensorSample::new(1, 10)));
        assert_eq!(enc.read(Duration::ZERO).unwrap(), Some(SensorSample::new(-2, 20)));
        assert_eq!(enc.read(Duration::ZERO).unwrap(), None);
    }
}
