//! [`OdomLoop`] – the odometry dispatch loop.
//!
//! One task owns the [`OdometryNode`] and nothing else touches it. Each
//! iteration blocks until one of three things happens:
//!
//! 1. **Shutdown** – the watch flag flips to `true` (or its sender is
//!    dropped); the loop returns its [`LoopStats`].
//! 2. **Sample** – an encoder sample arrives on the bus; it is converted and
//!    the absolute count plus the velocity estimate are published.
//! 3. **Deadline** – the watchdog deadline passes with no publication; a
//!    zero-velocity estimate is published.
//!
//! Pending samples are always served before the deadline branch, so a sample
//! that arrives right at the deadline suppresses the zero-velocity assertion.
//!
//! A failed publication is logged and counted; the loop carries on and the
//! next sample or deadline supersedes it.

use std::time::Instant;

use chrono::Utc;
use odom_core::{OdometryConfig, OdometryNode};
use odom_middleware::{OdomPublisher, SampleSubscriber};
use odom_types::{OdomError, SensorSample, Stamp};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Counters reported when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Encoder samples converted and published.
    pub samples: u64,
    /// Encoder samples rejected as malformed.
    pub rejected: u64,
    /// Zero-velocity estimates synthesized by the watchdog.
    pub watchdog_fires: u64,
    /// Individual publish calls that failed.
    pub publish_failures: u64,
    /// Samples overwritten on the bus before the loop read them. Their ticks
    /// are missing from the absolute count.
    pub lagged_samples: u64,
}

/// Current time as read by the Tokio clock (pausable in tests) plus the
/// wall clock for message headers.
pub fn now_stamp() -> Stamp {
    Stamp::new(Utc::now(), tokio::time::Instant::now().into_std())
}

/// The dispatch loop: owns the node and the outbound publisher.
pub struct OdomLoop<P: OdomPublisher> {
    node: OdometryNode,
    publisher: P,
    stats: LoopStats,
    /// `false` while publications keep failing, so only the first failure of
    /// a streak is logged at `warn`.
    publish_healthy: bool,
}

impl<P: OdomPublisher> OdomLoop<P> {
    /// Build the loop; the watchdog is armed at the current instant.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::InvalidConfig`] if `config` is out of range.
    pub fn new(config: OdometryConfig, publisher: P) -> Result<Self, OdomError> {
        let node = OdometryNode::new(config, now_stamp())?;
        Ok(Self {
            node,
            publisher,
            stats: LoopStats::default(),
            publish_healthy: true,
        })
    }

    pub fn node(&self) -> &OdometryNode {
        &self.node
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Convert and publish one encoder sample observed at `now`.
    ///
    /// Malformed samples are logged and dropped without publishing.
    pub fn handle_sample(&mut self, sample: SensorSample, now: Stamp) {
        match self.node.ingest(sample, now) {
            Ok(out) => {
                self.stats.samples += 1;
                let abs = self.publisher.publish_encoder_abs(out.encoder_abs);
                record_publish(&mut self.stats, &mut self.publish_healthy, "encoder_abs", abs);
                let odom = self.publisher.publish_odom(out.odom);
                record_publish(&mut self.stats, &mut self.publish_healthy, "odom", odom);
                debug!(
                    seq = out.odom.header.seq,
                    linear_x = out.odom.linear_x,
                    encoder_abs = out.encoder_abs,
                    "published encoder sample"
                );
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(error = %e, "rejected encoder sample");
            }
        }
    }

    /// Run the watchdog check at `now`, publishing a zero velocity on expiry.
    pub fn handle_deadline(&mut self, now: Stamp) {
        if let Some(estimate) = self.node.check_deadline(now) {
            self.stats.watchdog_fires += 1;
            let result = self.publisher.publish_odom(estimate);
            record_publish(&mut self.stats, &mut self.publish_healthy, "odom", result);
        }
    }

    /// Serve `samples` until shutdown or until the sample stream closes.
    pub async fn run(
        mut self,
        mut samples: SampleSubscriber,
        mut shutdown: watch::Receiver<bool>,
    ) -> LoopStats {
        info!(
            ticks_per_meter = self.node.config().ticks_per_meter,
            frame_id = %self.node.config().frame_id,
            deadline_timeout = self.node.config().deadline_timeout,
            "odometry loop started"
        );

        while !*shutdown.borrow() {
            let deadline = self.node.next_deadline();
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("shutdown sender dropped");
                        break;
                    }
                }
                sample = samples.recv() => match sample {
                    Some(sample) => self.handle_sample(sample, now_stamp()),
                    None => {
                        info!("encoder sample stream closed");
                        break;
                    }
                },
                _ = sleep_until(deadline) => self.handle_deadline(now_stamp()),
            }
        }

        self.stats.lagged_samples = samples.lagged();
        let stats = self.stats;
        info!(
            samples = stats.samples,
            rejected = stats.rejected,
            watchdog_fires = stats.watchdog_fires,
            publish_failures = stats.publish_failures,
            lagged_samples = stats.lagged_samples,
            "odometry loop stopped"
        );
        stats
    }
}

fn record_publish(
    stats: &mut LoopStats,
    healthy: &mut bool,
    topic: &str,
    result: Result<(), OdomError>,
) {
    match result {
        Ok(()) => {
            if !*healthy {
                info!(topic, "publishing recovered");
                *healthy = true;
            }
        }
        Err(e) => {
            stats.publish_failures += 1;
            if *healthy {
                warn!(topic, error = %e, "publish failed");
                *healthy = false;
            } else {
                debug!(topic, error = %e, "publish failed");
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odom_middleware::{EventBus, Topic};
    use odom_types::{Event, EventPayload, VelocityEstimate};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Published {
        Abs(i32),
        Odom(VelocityEstimate),
    }

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        log: Arc<Mutex<Vec<Published>>>,
    }

    impl RecordingPublisher {
        fn odoms(&self) -> Vec<VelocityEstimate> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter_map(|p| match p {
                    Published::Odom(est) => Some(est.clone()),
                    Published::Abs(_) => None,
                })
                .collect()
        }

        fn all(&self) -> Vec<Published> {
            self.log.lock().unwrap().clone()
        }
    }

    impl OdomPublisher for RecordingPublisher {
        fn publish_encoder_abs(&self, value: i32) -> Result<(), OdomError> {
            self.log.lock().unwrap().push(Published::Abs(value));
            Ok(())
        }

        fn publish_odom(&self, estimate: &VelocityEstimate) -> Result<(), OdomError> {
            self.log.lock().unwrap().push(Published::Odom(estimate.clone()));
            Ok(())
        }
    }

    struct FailingPublisher;

    impl OdomPublisher for FailingPublisher {
        fn publish_encoder_abs(&self, _value: i32) -> Result<(), OdomError> {
            Err(OdomError::Channel("no subscribers".to_string()))
        }

        fn publish_odom(&self, _estimate: &VelocityEstimate) -> Result<(), OdomError> {
            Err(OdomError::Channel("no subscribers".to_string()))
        }
    }

    fn send_sample(bus: &EventBus, ticks: i32, duration_us: u64) {
        bus.publish_to(
            Topic::MotorEncoder,
            Event::now("test", EventPayload::EncoderSample(SensorSample::new(ticks, duration_us))),
        )
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_sensor_gets_one_zero_velocity_per_deadline() {
        let bus = EventBus::default();
        let publisher = RecordingPublisher::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), publisher.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(bus.subscribe_samples(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        let odoms = publisher.odoms();
        assert_eq!(odoms.len(), 2, "expected fires at ~0.1s and ~0.2s");
        assert!(odoms.iter().all(|est| est.linear_x == 0.0));
        assert_eq!(stats.watchdog_fires, 2);
        assert_eq!(stats.samples, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_zero_velocity_before_deadline() {
        let bus = EventBus::default();
        let publisher = RecordingPublisher::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), publisher.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(bus.subscribe_samples(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(99)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(publisher.odoms().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn samples_publish_abs_then_odom_and_postpone_watchdog() {
        let bus = EventBus::default();
        let publisher = RecordingPublisher::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), publisher.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(bus.subscribe_samples(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        send_sample(&bus, 310, 1_000_000);
        tokio::time::sleep(Duration::from_millis(60)).await;
        send_sample(&bus, -155, 500_000);
        // Last publication at 120ms; the watchdog is due at 220ms.
        tokio::time::sleep(Duration::from_millis(130)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        let log = publisher.all();
        assert_eq!(log.len(), 5);
        assert_eq!(log[0], Published::Abs(310));
        assert!(matches!(&log[1], Published::Odom(est) if est.linear_x == 1.0));
        assert_eq!(log[2], Published::Abs(155));
        assert!(matches!(&log[3], Published::Odom(est) if est.linear_x == -1.0));
        assert!(matches!(&log[4], Published::Odom(est) if est.linear_x == 0.0));

        let seqs: Vec<u64> = publisher.odoms().iter().map(|e| e.header.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.watchdog_fires, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_sample_publishes_nothing() {
        let bus = EventBus::default();
        let publisher = RecordingPublisher::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), publisher.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(bus.subscribe_samples(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        send_sample(&bus, 50, 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert!(publisher.all().is_empty());
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.samples, 0);
    }

    #[test]
    fn malformed_sample_leaves_state_untouched() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut odom_loop =
                OdomLoop::new(OdometryConfig::default(), RecordingPublisher::default()).unwrap();
            odom_loop.handle_sample(SensorSample::new(7, 1_000), now_stamp());
            let before = odom_loop.node().last_publish();

            odom_loop.handle_sample(SensorSample::new(7, 0), now_stamp());

            assert_eq!(odom_loop.node().encoder_abs(), 7);
            assert_eq!(odom_loop.node().last_publish(), before);
            assert_eq!(odom_loop.stats().rejected, 1);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failures_do_not_stop_the_loop() {
        let bus = EventBus::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), FailingPublisher).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(bus.subscribe_samples(), shutdown_rx));

        send_sample(&bus, 1, 1_000);
        tokio::time::sleep(Duration::from_millis(150)).await;
        send_sample(&bus, 2, 1_000);
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.samples, 2);
        assert_eq!(stats.watchdog_fires, 1);
        // Two calls per sample plus one per watchdog fire.
        assert_eq!(stats.publish_failures, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn overwritten_samples_are_counted() {
        let bus = EventBus::new(2);
        let samples = bus.subscribe_samples();
        for ticks in 1..=5 {
            send_sample(&bus, ticks, 1_000);
        }
        let publisher = RecordingPublisher::default();
        let odom_loop = OdomLoop::new(OdometryConfig::default(), publisher.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(odom_loop.run(samples, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        // Only the two newest samples survived; the count misses 1 + 2 + 3.
        assert_eq!(stats.lagged_samples, 3);
        assert_eq!(stats.samples, 2);
        let abs: Vec<i32> = publisher
            .all()
            .into_iter()
            .filter_map(|p| match p {
                Published::Abs(v) => Some(v),
                Published::Odom(_) => None,
            })
            .collect();
        assert_eq!(abs, vec![4, 9]);
    }

    #[tokio::test]
    async fn encoder_frame_round_trips_through_bridge_and_loop() {
        use futures_util::{SinkExt, StreamExt};
        use odom_middleware::{BridgeTopics, BusPublisher, RosBridge};
        use serde_json::Value;
        use tokio_tungstenite::{connect_async, tungstenite::Message};

        let bus = Arc::new(EventBus::default());
        let samples = bus.subscribe_samples();
        // Long deadline so no zero-velocity estimate takes seq 1.
        let cfg = OdometryConfig {
            deadline_timeout: 5.0,
            ..OdometryConfig::default()
        };
        let odom_loop = OdomLoop::new(cfg, BusPublisher::new(Arc::clone(&bus))).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loop_handle = tokio::spawn(odom_loop.run(samples, shutdown_rx));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(RosBridge::new(Arc::clone(&bus), BridgeTopics::default()).serve(listener));

        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let frame = r#"{"op":"publish","topic":"/motor_encoder","msg":{"encoder_ticks":310,"duration":1000000}}"#;
        ws.send(Message::Text(String::from(frame).into())).await.unwrap();

        let mut abs: Option<Value> = None;
        let mut odom: Option<Value> = None;
        let collect = async {
            while abs.is_none() || odom.is_none() {
                let msg = ws.next().await.unwrap().unwrap();
                let Message::Text(text) = msg else { continue };
                let json: Value = serde_json::from_str(text.as_str()).unwrap();
                match json["topic"].as_str() {
                    Some("motor_encoder_abs") => abs = Some(json),
                    Some("motor_odom") => odom = Some(json),
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .expect("bridge should forward both publications");

        let abs = abs.unwrap();
        assert_eq!(abs["op"], "publish");
        assert_eq!(abs["msg"]["data"], 310);

        let odom = odom.unwrap();
        let msg = &odom["msg"];
        assert_eq!(msg["header"]["seq"], 1);
        assert_eq!(msg["header"]["frame_id"], "base_link");
        assert_eq!(msg["twist"]["twist"]["linear"]["x"], 1.0);
        let cov = msg["twist"]["covariance"].as_array().unwrap();
        assert_eq!(cov.len(), 36);
        assert_eq!(cov[0], 1e-3);
        for i in 1..6 {
            assert_eq!(cov[i * 7], 999.0, "diagonal entry {i}");
        }
        assert_eq!(cov[1], 0.0);

        shutdown_tx.send(true).unwrap();
        let stats = loop_handle.await.unwrap();
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.publish_failures, 0);
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ends_when_sample_stream_closes() {
        let bus = EventBus::default();
        let samples = bus.subscribe_samples();
        drop(bus);
        let odom_loop = OdomLoop::new(OdometryConfig::default(), RecordingPublisher::default()).unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats = odom_loop.run(samples, shutdown_rx).await;
        assert_eq!(stats, LoopStats::default());
    }

    #[test]
    fn invalid_config_fails_fast() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let cfg = OdometryConfig {
            deadline_timeout: 0.0,
            ..OdometryConfig::default()
        };
        assert!(matches!(
            OdomLoop::new(cfg, RecordingPublisher::default()),
            Err(OdomError::InvalidConfig(_))
        ));
    }
}
