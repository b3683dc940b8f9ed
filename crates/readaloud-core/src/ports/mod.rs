//! Port definitions for the infrastructure the pipeline talks to.
//!
//! The pipeline only ever sees these traits:
//! - [`SpeechConnector`] / [`SpeechConnection`] - duplex link to the backend
//! - [`AudioPlayer`] / [`PlaybackHandle`] - the local player process
//! - [`ProgressEmitter`] - host notifications
//!
//! Concrete adapters live in `readaloud-stream` (WebSocket) and
//! `readaloud-playback` (process player); test fakes live in
//! [`crate::testing`].

mod connector;
mod emitter;
mod player;

pub use connector::{CloseInfo, ConnectTarget, Frame, SpeechConnection, SpeechConnector};
pub use emitter::{ChannelEmitter, NoopEmitter, ProgressEmitter};
pub use player::{AudioPlayer, PlaybackHandle};
