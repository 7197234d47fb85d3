//! `odom-middleware` – Transport plumbing
//!
//! Moves encoder samples into the odometry node and its publications out,
//! without caring what the numbers mean.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`adapter`] – the [`OdomPublisher`] sink the dispatch loop writes to,
//!   and its bus-backed implementation.
//! - [`wire`] – rosbridge-style JSON frames for encoder samples, twist
//!   estimates, and absolute counts.
//! - [`bridge`] – WebSocket server that speaks [`wire`] frames to external
//!   clients and routes them through the [`bus`].

pub mod adapter;
pub mod bridge;
pub mod bus;
pub mod wire;

pub use adapter::{BusPublisher, OdomPublisher};
pub use bridge::{BridgeTopics, RosBridge};
pub use bus::{EventBus, SampleSubscriber, Topic, TopicReceiver};
