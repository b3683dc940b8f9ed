//! Local playback for readaloud.
//!
//! [`AudioBuffer`] is the scoped temp file, [`ProcessPlayer`] runs the
//! external player, and [`AudioSink`] ties them together for one invocation.

#![deny(unused_crate_dependencies)]

pub mod buffer;
pub mod player;
pub mod sink;

pub use buffer::AudioBuffer;
pub use player::{DEFAULT_STOP_GRACE, ProcessPlayer, shutdown_child};
pub use sink::AudioSink;
