//! `odom-runtime` – Dispatch & Wiring
//!
//! # Modules
//!
//! - [`dispatch`] – [`OdomLoop`][dispatch::OdomLoop]: the single-threaded
//!   event loop that waits for "next encoder sample or watchdog deadline,
//!   whichever comes first", drives the
//!   [`OdometryNode`][odom_core::OdometryNode], and hands every publication to
//!   an [`OdomPublisher`][odom_middleware::OdomPublisher].
//! - [`feed`] – pumps any [`EncoderSource`][odom_hal::EncoderSource] onto the
//!   event bus at a fixed period.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod dispatch;
pub mod feed;
pub mod telemetry;

pub use dispatch::{LoopStats, OdomLoop, now_stamp};
pub use feed::spawn_encoder_feed;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
