//! Periodic encoder polling.
//!
//! [`spawn_encoder_feed`] reads an [`EncoderSource`] once per period and
//! publishes each sample on [`Topic::MotorEncoder`], the same topic the
//! bridge feeds. The dispatch loop cannot tell the two producers apart.

use std::sync::Arc;
use std::time::Duration;

use odom_hal::EncoderSource;
use odom_middleware::{EventBus, Topic};
use odom_types::{Event, EventPayload};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Poll `source` every `period` until it reports exhaustion.
///
/// Each read is given the time elapsed since the previous one. Read errors
/// are logged and the next period is tried again.
pub fn spawn_encoder_feed<E>(mut source: E, bus: Arc<EventBus>, period: Duration) -> JoinHandle<()>
where
    E: EncoderSource + 'static,
{
    tokio::spawn(async move {
        let origin = format!("odom-runtime::feed/{}", source.id());
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut last = Instant::now();
        info!(encoder = %source.id(), period_ms = period.as_millis() as u64, "encoder feed started");

        loop {
            ticker.tick().await;
            let now = Instant::now();
            let elapsed = now.duration_since(last);
            last = now;

            match source.read(elapsed) {
                Ok(Some(sample)) => {
                    let event = Event::now(origin.clone(), EventPayload::EncoderSample(sample));
                    if let Err(e) = bus.publish_to(Topic::MotorEncoder, event) {
                        debug!(error = %e, "encoder sample not delivered");
                    }
                }
                Ok(None) => {
                    info!(encoder = %source.id(), "encoder source exhausted");
                    break;
                }
                Err(e) => warn!(encoder = %source.id(), error = %e, "encoder read failed"),
            }
        }
    })
}
