//! Pipeline orchestration for readaloud.
//!
//! [`SpeechPipeline`] wires voice settings, the stream session, and the audio
//! sink together for one invocation and reports progress through a
//! [`ProgressEmitter`](readaloud_core::ProgressEmitter).
//! [`SpeechController`] adds supersede-on-reinvoke and stop.

#![deny(unused_crate_dependencies)]

pub mod controller;
pub mod pipeline;

pub use controller::SpeechController;
pub use pipeline::{SpeakOutcome, SpeakRequest, SpeechPipeline};

// Silence unused dev-dependency warnings for crates only used by integration tests
#[cfg(test)]
use mockall as _;
