//! `odom-types` – shared data model for the motor odometry node.
//!
//! Everything that crosses a crate boundary lives here: the raw encoder
//! [`SensorSample`], the outbound [`VelocityEstimate`] with its
//! [`Covariance`] block, the bus [`Event`] envelope, and the workspace-wide
//! [`OdomError`].

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Side length of the pose covariance matrix: (x, y, z, roll, pitch, yaw).
pub const COVARIANCE_DIM: usize = 6;

/// Number of entries in the row-major covariance matrix.
pub const COVARIANCE_LEN: usize = COVARIANCE_DIM * COVARIANCE_DIM;

/// One raw report from the motor encoder: ticks counted over `duration_us`.
///
/// Field names on the wire follow the encoder message (`encoder_ticks`,
/// `duration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Signed tick delta since the previous report.
    #[serde(rename = "encoder_ticks")]
    pub ticks: i32,
    /// Elapsed time the ticks occurred over, in microseconds.
    #[serde(rename = "duration")]
    pub duration_us: u64,
}

impl SensorSample {
    pub fn new(ticks: i32, duration_us: u64) -> Self {
        Self { ticks, duration_us }
    }
}

/// A point in time carried as both wall-clock and monotonic readings.
///
/// The wall-clock part stamps outbound headers; the monotonic part drives
/// deadline arithmetic so that clock steps never fire (or starve) the
/// watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub wall: DateTime<Utc>,
    pub mono: Instant,
}

impl Stamp {
    pub fn new(wall: DateTime<Utc>, mono: Instant) -> Self {
        Self { wall, mono }
    }
}

/// Standard message header stamped on every velocity publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Strictly increasing publication counter, shared by real and
    /// synthesized estimates.
    pub seq: u64,
    pub stamp: DateTime<Utc>,
    pub frame_id: String,
}

/// Row-major 6×6 covariance matrix over (x, y, z, roll, pitch, yaw).
///
/// Serialised as a flat array of 36 numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariance([f64; COVARIANCE_LEN]);

impl Covariance {
    /// An all-zero (fully uncorrelated, zero variance) matrix.
    pub fn zeroed() -> Self {
        Self([0.0; COVARIANCE_LEN])
    }

    /// Entry at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if either index is `>= COVARIANCE_DIM`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[Self::index(row, col)]
    }

    /// Overwrite the entry at (`row`, `col`).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.0[Self::index(row, col)] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    fn index(row: usize, col: usize) -> usize {
        assert!(
            row < COVARIANCE_DIM && col < COVARIANCE_DIM,
            "covariance index ({row}, {col}) out of range"
        );
        row * COVARIANCE_DIM + col
    }
}

impl Default for Covariance {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Serialize for Covariance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Covariance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<f64>::deserialize(deserializer)?;
        let len = entries.len();
        let array: [f64; COVARIANCE_LEN] = entries
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"36 covariance entries"))?;
        Ok(Self(array))
    }
}

/// Linear velocity along the robot's x axis with its uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityEstimate {
    pub header: Header,
    /// Metres per second along the primary motion axis.
    pub linear_x: f64,
    pub covariance: Covariance,
}

/// Envelope for everything routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    /// e.g., "odom-middleware::bridge/motor_encoder"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Build an event stamped with the current wall-clock time.
    pub fn now(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Raw encoder report awaiting conversion.
    EncoderSample(SensorSample),
    /// Velocity estimate, real or synthesized by the deadline watchdog.
    Odometry(VelocityEstimate),
    /// Accumulated absolute encoder position.
    EncoderAbsolute(i32),
}

/// Global error type for conversion, configuration, and transport failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OdomError {
    #[error("Malformed sample (ticks={ticks}, duration={duration_us}us): {reason}")]
    MalformedSample {
        ticks: i32,
        duration_us: u64,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Transport Error: {0}")]
    Transport(String),
}
