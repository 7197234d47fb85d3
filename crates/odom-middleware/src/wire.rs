//! rosbridge-style JSON frames.
//!
//! Every frame is an object `{"op": "publish", "topic": ..., "msg": ...}`.
//! Inbound encoder messages carry `{"encoder_ticks": i32, "duration": u64}`;
//! outbound estimates follow the `geometry_msgs/TwistWithCovarianceStamped`
//! layout and absolute counts the `std_msgs/Int32` layout.

use chrono::{DateTime, Utc};
use odom_types::{OdomError, SensorSample, VelocityEstimate};
use serde::{Deserialize, Serialize};

const OP_PUBLISH: &str = "publish";

#[derive(Debug, Serialize, Deserialize)]
struct Frame<T> {
    op: String,
    topic: String,
    msg: T,
}

impl<T: Serialize> Frame<T> {
    fn publish(topic: &str, msg: T) -> Self {
        Self {
            op: OP_PUBLISH.to_string(),
            topic: topic.to_string(),
            msg,
        }
    }

    fn to_json(&self) -> Result<String, OdomError> {
        serde_json::to_string(self).map_err(|e| OdomError::Serialization(e.to_string()))
    }
}

// ── Outbound message shapes ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TimeMsg {
    secs: i64,
    nsecs: u32,
}

impl From<DateTime<Utc>> for TimeMsg {
    fn from(stamp: DateTime<Utc>) -> Self {
        Self {
            secs: stamp.timestamp(),
            nsecs: stamp.timestamp_subsec_nanos(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HeaderMsg<'a> {
    seq: u64,
    stamp: TimeMsg,
    frame_id: &'a str,
}

#[derive(Debug, Default, Serialize)]
struct Vector3Msg {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Serialize)]
struct TwistMsg {
    linear: Vector3Msg,
    angular: Vector3Msg,
}

#[derive(Debug, Serialize)]
struct TwistWithCovarianceMsg<'a> {
    twist: TwistMsg,
    covariance: &'a [f64],
}

#[derive(Debug, Serialize)]
struct TwistWithCovarianceStampedMsg<'a> {
    header: HeaderMsg<'a>,
    twist: TwistWithCovarianceMsg<'a>,
}

#[derive(Debug, Serialize)]
struct Int32Msg {
    data: i32,
}

// ── Public codec ──────────────────────────────────────────────────────────

/// Encode `estimate` as a publish frame on `topic`.
pub fn encode_odom(topic: &str, estimate: &VelocityEstimate) -> Result<String, OdomError> {
    let msg = TwistWithCovarianceStampedMsg {
        header: HeaderMsg {
            seq: estimate.header.seq,
            stamp: estimate.header.stamp.into(),
            frame_id: &estimate.header.frame_id,
        },
        twist: TwistWithCovarianceMsg {
            twist: TwistMsg {
                linear: Vector3Msg {
                    x: estimate.linear_x,
                    ..Vector3Msg::default()
                },
                angular: Vector3Msg::default(),
            },
            covariance: estimate.covariance.as_slice(),
        },
    };
    Frame::publish(topic, msg).to_json()
}

/// Encode an absolute tick count as a publish frame on `topic`.
pub fn encode_encoder_abs(topic: &str, value: i32) -> Result<String, OdomError> {
    Frame::publish(topic, Int32Msg { data: value }).to_json()
}

/// Encode `sample` as a publish frame on `topic` (what an encoder client
/// sends).
pub fn encode_sample(topic: &str, sample: &SensorSample) -> Result<String, OdomError> {
    Frame::publish(topic, sample).to_json()
}

/// Decode an inbound frame addressed to `encoder_topic`.
///
/// Returns `Ok(None)` for valid JSON frames that are not publishes on the
/// encoder topic, so unrelated traffic is ignored.
///
/// # Errors
///
/// * [`OdomError::Serialization`] – `text` is not a JSON frame.
/// * [`OdomError::Parsing`] – the frame targets the encoder topic but its
///   `msg` is not an encoder message.
pub fn decode_sample(text: &str, encoder_topic: &str) -> Result<Option<SensorSample>, OdomError> {
    let frame: Frame<Option<serde_json::Value>> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) if e.is_data() => return Ok(None),
        Err(e) => return Err(OdomError::Serialization(e.to_string())),
    };
    if frame.op != OP_PUBLISH || frame.topic != encoder_topic {
        return Ok(None);
    }
    let msg = frame
        .msg
        .ok_or_else(|| OdomError::Parsing(format!("publish on {encoder_topic} has no msg")))?;
    serde_json::from_value(msg)
        .map(Some)
        .map_err(|e| OdomError::Parsing(format!("bad encoder message on {encoder_topic}: {e}")))
}
