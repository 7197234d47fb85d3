//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::MotorEncoder`] | Raw encoder samples on their way into the node |
//! | [`Topic::MotorOdom`] | Velocity estimates, real and watchdog-synthesized |
//! | [`Topic::MotorEncoderAbs`] | Accumulated absolute encoder position |

use odom_types::{Event, EventPayload, OdomError, SensorSample};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 100;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound encoder samples.
    MotorEncoder,
    /// Outbound velocity estimates.
    MotorOdom,
    /// Outbound absolute tick counts.
    MotorEncoderAbs,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    motor_encoder: broadcast::Sender<Event>,
    motor_odom: broadcast::Sender<Event>,
    motor_encoder_abs: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0, like [`broadcast::channel`].
    pub fn new(capacity: usize) -> Self {
        let (motor_encoder, _) = broadcast::channel(capacity);
        let (motor_odom, _) = broadcast::channel(capacity);
        let (motor_encoder_abs, _) = broadcast::channel(capacity);
        Self {
            motor_encoder,
            motor_odom,
            motor_encoder_abs,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`OdomError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, OdomError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| OdomError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to [`Topic::MotorEncoder`] and receive bare samples.
    pub fn subscribe_samples(&self) -> SampleSubscriber {
        SampleSubscriber {
            receiver: self.motor_encoder.subscribe(),
            lagged: 0,
        }
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::MotorEncoder => &self.motor_encoder,
            Topic::MotorOdom => &self.motor_odom,
            Topic::MotorEncoderAbs => &self.motor_encoder_abs,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Sample subscriber
// ---------------------------------------------------------------------------

/// Delivers only the [`SensorSample`]s published on [`Topic::MotorEncoder`].
pub struct SampleSubscriber {
    receiver: broadcast::Receiver<Event>,
    lagged: u64,
}

impl SampleSubscriber {
    /// Wait for the next encoder sample.
    ///
    /// Lag is logged and skipped over; samples lost that way are gone and
    /// counted in [`lagged`](Self::lagged). Returns `None` once every sender
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<SensorSample> {
        loop {
            match self.receiver.recv().await {
                Ok(Event {
                    payload: EventPayload::EncoderSample(sample),
                    ..
                }) => return Some(sample),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.lagged = self.lagged.saturating_add(n);
                    warn!(lagged_by = n, total = self.lagged, "encoder sample subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events overwritten before this subscriber could read them.
    ///
    /// Their ticks never reached the node, so the absolute count is short by
    /// whatever they carried.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
