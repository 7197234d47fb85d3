//! Generic `EncoderSource` trait for incremental motion sensors.
//!
//! Drivers implement this trait; the runtime's feed task polls it and puts
//! every sample on the bus. Nothing downstream knows which driver is in use.

use std::time::Duration;

use odom_types::{OdomError, SensorSample};

/// An incremental encoder that reports tick deltas.
pub trait EncoderSource: Send {
    /// Stable identifier for this encoder, e.g. `"rear_motor"`.
    fn id(&self) -> &str;

    /// Read the ticks counted over the last `elapsed` interval.
    ///
    /// Returns `Ok(None)` once the source is exhausted and will never
    /// produce another sample.
    ///
    /// # Errors
    ///
    /// Returns an [`OdomError`] if the hardware could not be read. The feed
    /// logs it and polls again on the next period.
    fn read(&mut self, elapsed: Duration) -> Result<Option<SensorSample>, OdomError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process encoder used only for tests.
    struct FailingEncoder;

    impl EncoderSource for FailingEncoder {
        fn id(&self) -> &str {
            "failing"
        }

        fn read(&mut self, _elapsed: Duration) -> Result<Option<SensorSample>, OdomError> {
            Err(OdomError::Transport("serial port closed".to_string()))
        }
    }

    #[test]
    fn trait_object_reports_errors() {
        let mut enc: Box<dyn EncoderSource> = Box::new(FailingEncoder);
        assert_eq!(enc.id(), "failing");
        assert!(matches!(
            enc.read(Duration::from_millis(10)),
            Err(OdomError::Transport(_))
        ));
    }
}
