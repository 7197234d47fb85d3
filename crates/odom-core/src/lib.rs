//! `odom-core` – Conversion & Liveness
//!
//! The part of the odometry node with real semantics. It never touches a
//! transport; every operation takes the current [`Stamp`][odom_types::Stamp]
//! and returns what should be published.
//!
//! # Modules
//!
//! - [`config`] – [`OdometryConfig`][config::OdometryConfig]: the four
//!   tunables of the node and their startup validation.
//! - [`covariance`] – builds the static uncertainty block attached to every
//!   velocity estimate.
//! - [`converter`] – tick-to-velocity conversion and the
//!   [`TickAccumulator`][converter::TickAccumulator] absolute position counter.
//! - [`watchdog`] – [`DeadlineWatchdog`][watchdog::DeadlineWatchdog]:
//!   detects publication silence longer than the configured deadline.
//! - [`node`] – [`OdometryNode`][node::OdometryNode]: the context object that
//!   owns all mutable state and is driven by the dispatch loop.

pub mod config;
pub mod converter;
pub mod covariance;
pub mod node;
pub mod watchdog;

pub use config::OdometryConfig;
pub use converter::{TickAccumulator, velocity};
pub use covariance::{UNKNOWN_VARIANCE, build_covariance};
pub use node::{OdometryNode, SamplePublication};
pub use watchdog::{DeadlineState, DeadlineWatchdog};
