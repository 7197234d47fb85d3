//! Outbound publication sink.
//!
//! The dispatch loop never speaks to a transport directly. It hands each
//! publication to an [`OdomPublisher`]; [`BusPublisher`] forwards them onto
//! the internal [`EventBus`] where the bridge (or any other listener) picks
//! them up.

use std::sync::Arc;

use odom_types::{Event, EventPayload, OdomError, VelocityEstimate};

use crate::bus::{EventBus, Topic};

/// Every outbound transport must implement this trait.
///
/// # Contract
///
/// Both calls are synchronous and must not block. A returned error affects
/// only that one publication; the caller carries on with the next one.
pub trait OdomPublisher: Send + Sync {
    /// Publish the accumulated absolute encoder position.
    fn publish_encoder_abs(&self, value: i32) -> Result<(), OdomError>;

    /// Publish a velocity estimate.
    fn publish_odom(&self, estimate: &VelocityEstimate) -> Result<(), OdomError>;
}

const SOURCE: &str = "odom-middleware::bus_publisher";

/// [`OdomPublisher`] that routes publications onto an [`EventBus`].
#[derive(Clone)]
pub struct BusPublisher {
    bus: Arc<EventBus>,
}

impl BusPublisher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl OdomPublisher for BusPublisher {
    fn publish_encoder_abs(&self, value: i32) -> Result<(), OdomError> {
        let event = Event::now(SOURCE, EventPayload::EncoderAbsolute(value));
        self.bus.publish_to(Topic::MotorEncoderAbs, event).map(|_| ())
    }

    fn publish_odom(&self, estimate: &VelocityEstimate) -> Result<(), OdomError> {
        let event = Event::now(SOURCE, EventPayload::Odometry(estimate.clone()));
        self.bus.publish_to(Topic::MotorOdom, event).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use odom_types::{Covariance, Header};

    fn estimate(seq: u64, linear_x: f64) -> VelocityEstimate {
        VelocityEstimate {
            header: Header {
                seq,
                stamp: Utc::now(),
                frame_id: "base_link".to_string(),
            },
            linear_x,
            covariance: Covariance::zeroed(),
        }
    }

    #[tokio::test]
    async fn publish_odom_lands_on_odom_topic() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe_to(Topic::MotorOdom);
        let publisher = BusPublisher::new(Arc::clone(&bus));

        publisher.publish_odom(&estimate(3, 0.5)).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, SOURCE);
        match event.payload {
            EventPayload::Odometry(est) => {
                assert_eq!(est.header.seq, 3);
                assert_eq!(est.linear_x, 0.5);
            }
            other => panic!("expected Odometry payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_encoder_abs_lands_on_abs_topic() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe_to(Topic::MotorEncoderAbs);
        let publisher = BusPublisher::new(Arc::clone(&bus));

        publisher.publish_encoder_abs(-77).unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::EncoderAbsolute(-77)));
    }

    #[test]
    fn publish_without_listeners_is_an_error() {
        let publisher = BusPublisher::new(Arc::new(EventBus::default()));
        assert!(publisher.publish_odom(&estimate(1, 0.0)).is_err());
        assert!(publisher.publish_encoder_abs(0).is_err());
    }
}
