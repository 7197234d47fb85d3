//! [`OdometryNode`] – the single owner of all odometry state.
//!
//! The node holds the absolute tick counter, the deadline watchdog, and the
//! one reusable [`VelocityEstimate`] whose header and velocity are rewritten
//! on every publication. It performs no I/O: [`OdometryNode::ingest`] and
//! [`OdometryNode::check_deadline`] return what must be published and the
//! dispatch loop hands that to the transport.

use std::time::Instant;

use odom_types::{Header, OdomError, SensorSample, Stamp, VelocityEstimate};
use tracing::debug;

use crate::config::OdometryConfig;
use crate::converter::{self, TickAccumulator};
use crate::covariance::build_covariance;
use crate::watchdog::{DeadlineState, DeadlineWatchdog};

/// Publications produced by one accepted encoder sample.
///
/// The absolute count should be published before the velocity estimate.
#[derive(Debug)]
pub struct SamplePublication<'a> {
    pub encoder_abs: i32,
    pub odom: &'a VelocityEstimate,
}

/// Context object driven by the dispatch loop.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use chrono::Utc;
/// use odom_core::{OdometryConfig, OdometryNode};
/// use odom_types::{SensorSample, Stamp};
///
/// let start = Stamp::new(Utc::now(), Instant::now());
/// let mut node = OdometryNode::new(OdometryConfig::default(), start).unwrap();
///
/// let out = node.ingest(SensorSample::new(310, 1_000_000), start).unwrap();
/// assert_eq!(out.encoder_abs, 310);
/// assert_eq!(out.odom.linear_x, 1.0);
/// assert_eq!(out.odom.header.seq, 1);
/// ```
#[derive(Debug)]
pub struct OdometryNode {
    config: OdometryConfig,
    accumulator: TickAccumulator,
    watchdog: DeadlineWatchdog,
    estimate: VelocityEstimate,
}

impl OdometryNode {
    /// Validate `config` and build a node whose watchdog is armed at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::InvalidConfig`] if any option is out of range.
    pub fn new(config: OdometryConfig, start: Stamp) -> Result<Self, OdomError> {
        config.validate()?;
        let timeout = config.deadline()?;
        let estimate = VelocityEstimate {
            header: Header {
                seq: 0,
                stamp: start.wall,
                frame_id: config.frame_id.clone(),
            },
            linear_x: 0.0,
            covariance: build_covariance(config.uncertainty_fixed),
        };
        Ok(Self {
            config,
            accumulator: TickAccumulator::new(),
            watchdog: DeadlineWatchdog::new(timeout, start),
            estimate,
        })
    }

    /// Convert one encoder sample.
    ///
    /// On success the tick counter has advanced, the estimate carries the
    /// next sequence number stamped with `now`, and `now` is recorded as the
    /// last publication.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::MalformedSample`] for a zero-duration sample or
    /// one whose velocity is not finite. No state is touched in that case.
    pub fn ingest(
        &mut self,
        sample: SensorSample,
        now: Stamp,
    ) -> Result<SamplePublication<'_>, OdomError> {
        let linear_x = converter::velocity(&sample, self.config.ticks_per_meter)?;
        let encoder_abs = self.accumulator.add(sample.ticks);
        self.stamp_publication(linear_x, now);
        Ok(SamplePublication {
            encoder_abs,
            odom: &self.estimate,
        })
    }

    /// Run one watchdog check at `now`.
    ///
    /// Returns a zero-velocity estimate to publish when the stream has been
    /// silent for at least the deadline, and re-arms the watchdog. Returns
    /// `None` otherwise.
    pub fn check_deadline(&mut self, now: Stamp) -> Option<&VelocityEstimate> {
        match self.watchdog.state(now.mono) {
            DeadlineState::Quiet => None,
            DeadlineState::Expired => {
                self.stamp_publication(0.0, now);
                debug!(
                    seq = self.estimate.header.seq,
                    "deadline expired; asserting zero velocity"
                );
                Some(&self.estimate)
            }
        }
    }

    /// Monotonic instant of the next possible watchdog expiry.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Stamp of the most recent publication.
    pub fn last_publish(&self) -> Stamp {
        self.watchdog.last_publish()
    }

    /// Current absolute tick count.
    pub fn encoder_abs(&self) -> i32 {
        self.accumulator.total()
    }

    /// The reusable estimate as of the most recent publication.
    pub fn estimate(&self) -> &VelocityEstimate {
        &self.estimate
    }

    pub fn config(&self) -> &OdometryConfig {
        &self.config
    }

    fn stamp_publication(&mut self, linear_x: f64, now: Stamp) {
        self.estimate.header.seq += 1;
        self.estimate.header.stamp = now.wall;
        self.estimate.linear_x = linear_x;
        self.watchdog.record_publish(now);
    }
}
