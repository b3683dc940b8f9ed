//! Core domain types and port definitions for readaloud.
//!
//! Everything in this crate is infrastructure-free: voice settings
//! normalization, the immutable pipeline configuration, the error taxonomy,
//! progress events, and the traits that the WebSocket, playback, and host
//! adapters implement.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;
pub mod text;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_CHUNK_LENGTH_SCHEDULE, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MODEL_ID, DEFAULT_PREVIEW_CHARS, DEFAULT_STREAM_CHUNK_SIZE, MIN_PREVIEW_CHARS,
    PipelineConfig, PlaybackStrategy, PlayerCommand,
};
pub use error::{ErrorKind, PlaybackError, SpeakError, TransportError, classify_transport_error};
pub use events::PipelineEvent;
pub use ports::{
    AudioPlayer, ChannelEmitter, CloseInfo, ConnectTarget, Frame, NoopEmitter, PlaybackHandle,
    ProgressEmitter, SpeechConnection, SpeechConnector,
};
pub use settings::{
    DEFAULT_SIMILARITY_BOOST, DEFAULT_STABILITY, DEFAULT_VOICE_ID, Preferences, VoiceSettings,
    normalize,
};
pub use text::{preview, validate_selection, word_count};
