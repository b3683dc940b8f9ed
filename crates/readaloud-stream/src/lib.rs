//! Streaming synthesis session for readaloud.
//!
//! - [`protocol`]: outbound configuration/marker messages and inbound parsing
//! - [`session`]: the [`StreamSession`] state machine over a [`SpeechConnector`]
//! - [`ws`]: the `tokio-tungstenite` connector used in production
//!
//! [`SpeechConnector`]: readaloud_core::SpeechConnector

#![deny(unused_crate_dependencies)]

pub mod protocol;
pub mod session;
pub mod ws;

pub use protocol::{API_KEY_HEADER, ControlMessage, InboundMessage, InitialMessage, endpoint_url};
pub use session::{SessionEvent, SessionState, StreamSession, SynthesisRequest};
pub use ws::{WsConnection, WsConnector, map_ws_error};
