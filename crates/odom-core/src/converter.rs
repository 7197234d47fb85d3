//! Tick-to-velocity conversion and absolute tick accumulation.

use odom_types::{OdomError, SensorSample};

/// Microseconds per second, the unit of [`SensorSample::duration_us`].
pub const MICROS_PER_SECOND: f64 = 1e6;

/// Distance in metres covered by `ticks`.
pub fn ticks_to_meters(ticks: i32, ticks_per_meter: f64) -> f64 {
    f64::from(ticks) / ticks_per_meter
}

/// Instantaneous velocity (m/s) reported by `sample`.
///
/// Computed as `(ticks / ticks_per_meter) / (duration_us / 1e6)`. Negative
/// ticks yield a negative velocity.
///
/// # Errors
///
/// Returns [`OdomError::MalformedSample`] when `duration_us` is zero or the
/// quotient is not finite (a tiny `ticks_per_meter` can overflow it).
///
/// ```
/// use odom_core::converter::velocity;
/// use odom_types::SensorSample;
///
/// let v = velocity(&SensorSample::new(310, 1_000_000), 310.0).unwrap();
/// assert_eq!(v, 1.0);
/// assert!(velocity(&SensorSample::new(310, 0), 310.0).is_err());
/// ```
pub fn velocity(sample: &SensorSample, ticks_per_meter: f64) -> Result<f64, OdomError> {
    if sample.duration_us == 0 {
        return Err(OdomError::MalformedSample {
            ticks: sample.ticks,
            duration_us: sample.duration_us,
            reason: "duration is zero".to_string(),
        });
    }
    let meters = ticks_to_meters(sample.ticks, ticks_per_meter);
    let seconds = sample.duration_us as f64 / MICROS_PER_SECOND;
    let v = meters / seconds;
    if !v.is_finite() {
        return Err(OdomError::MalformedSample {
            ticks: sample.ticks,
            duration_us: sample.duration_us,
            reason: "velocity is not finite".to_string(),
        });
    }
    Ok(v)
}

/// Running sum of every accepted sample's ticks.
///
/// Starts at 0 and wraps on `i32` overflow, matching the width of the
/// published count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickAccumulator {
    total: i32,
}

impl TickAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `ticks` and return the new absolute count.
    pub fn add(&mut self, ticks: i32) -> i32 {
        self.total = self.total.wrapping_add(ticks);
        self.total
    }

    pub fn total(&self) -> i32 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_meter_per_second() {
        let v = velocity(&SensorSample::new(310, 1_000_000), 310.0).unwrap();
        assert_eq!(v, 1.0);
    }

    #[test]
    fn zero_ticks_is_zero_velocity() {
        let v = velocity(&SensorSample::new(0, 500_000), 310.0).unwrap();
        assert_eq!(v, 0.0);
    }

    #[test]
    fn matches_plain_float_division() {
        let cases = [(17, 12_345), (-250, 40_000), (i32::MAX, 1), (1, u64::MAX)];
        for (ticks, duration_us) in cases {
            let expected = (ticks as f64 / 287.5) / (duration_us as f64 / 1_000_000.0);
            let got = velocity(&SensorSample::new(ticks, duration_us), 287.5).unwrap();
            assert_eq!(got, expected, "ticks={ticks} duration={duration_us}");
        }
    }

    #[test]
    fn negative_ticks_reverse_direction() {
        let v = velocity(&SensorSample::new(-155, 500_000), 310.0).unwrap();
        assert_eq!(v, -1.0);
    }

    #[test]
    fn zero_duration_is_malformed() {
        let err = velocity(&SensorSample::new(42, 0), 310.0).unwrap_err();
        assert!(matches!(
            err,
            OdomError::MalformedSample { ticks: 42, duration_us: 0, .. }
        ));
    }

    #[test]
    fn overflowing_velocity_is_malformed() {
        // Passes config validation (finite, > 0) but overflows the quotient.
        let err = velocity(&SensorSample::new(i32::MAX, 1), 1e-308).unwrap_err();
        match err {
            OdomError::MalformedSample { ticks, duration_us, reason } => {
                assert_eq!(ticks, i32::MAX);
                assert_eq!(duration_us, 1);
                assert!(reason.contains("not finite"));
            }
            other => panic!("expected MalformedSample, got {other:?}"),
        }
    }

    #[test]
    fn accumulator_sums_signed_ticks() {
        let mut acc = TickAccumulator::new();
        assert_eq!(acc.add(100), 100);
        assert_eq!(acc.add(-30), 70);
        assert_eq!(acc.add(0), 70);
        assert_eq!(acc.total(), 70);
    }

    #[test]
    fn accumulator_wraps_instead_of_panicking() {
        let mut acc = TickAccumulator::new();
        acc.add(i32::MAX);
        assert_eq!(acc.add(1), i32::MIN);
    }
}
