//! Duplex connection to the synthesis backend.

use std::fmt;

use async_trait::async_trait;

use crate::error::TransportError;

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Where and how to connect.
#[derive(Clone)]
pub struct ConnectTarget {
    /// Full endpoint URL including the `model_id` query parameter.
    pub url: String,

    /// Credential presented in the request header.
    pub api_key: String,
}

impl ConnectTarget {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Close frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub const fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

/// One inbound frame. Ping/pong are handled below this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Peer close; `None` when the close frame carried no status.
    Close(Option<CloseInfo>),
}

/// Opens connections to the synthesis backend.
#[async_trait]
pub trait SpeechConnector: Send + Sync {
    /// Perform the connection handshake.
    async fn connect(&self, target: &ConnectTarget)
    -> Result<Box<dyn SpeechConnection>, TransportError>;
}

/// An open duplex connection.
///
/// `next_frame` must be cancel-safe: dropping its future before completion
/// must not lose a frame that was already delivered to the caller.
#[async_trait]
pub trait SpeechConnection: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next frame; `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Close the connection from this side.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_debug_redacts_key() {
        let target = ConnectTarget::new("wss://example/v1", "sk-secret");
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("wss://example/v1"));
    }

    #[test]
    fn test_close_info_normal() {
        assert!(CloseInfo::new(1000, "").is_normal());
        assert!(!CloseInfo::new(1008, "policy").is_normal());
    }
}
