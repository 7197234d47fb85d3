//! `odom-hal` – Encoder hardware abstraction
//!
//! - [`encoder`] – the [`EncoderSource`][encoder::EncoderSource] trait every
//!   encoder driver implements.
//! - [`sim`] – in-process encoders for headless runs and tests:
//!   [`SimEncoder`][sim::SimEncoder] (constant speed) and
//!   [`ScriptedEncoder`][sim::ScriptedEncoder] (replays a fixed list).

pub mod encoder;
pub mod sim;

pub use encoder::EncoderSource;
pub use sim::{ScriptedEncoder, SimEncoder};
