//! WebSocket transport backed by `tokio-tungstenite`.

use std::io;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use readaloud_core::error::mentions_network;
use readaloud_core::{
    CloseInfo, ConnectTarget, Frame, SpeechConnection, SpeechConnector, TransportError,
};

use crate::protocol::API_KEY_HEADER;

/// Opens `ws://` and `wss://` connections to the speech service.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector, installing the process-wide TLS crypto provider
    /// if none is installed yet.
    pub fn new() -> Self {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            trace!("TLS crypto provider already installed");
        }
        Self
    }
}

#[async_trait]
impl SpeechConnector for WsConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
    ) -> Result<Box<dyn SpeechConnection>, TransportError> {
        let mut request = target
            .url
            .as_str()
            .into_client_request()
            .map_err(map_ws_error)?;

        let credential = HeaderValue::from_str(&target.api_key).map_err(|_| {
            TransportError::Unauthorized(
                "API key contains characters that cannot be sent in a header".to_string(),
            )
        })?;
        request.headers_mut().insert(API_KEY_HEADER, credential);

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_ws_error)?;
        debug!(status = response.status().as_u16(), "WebSocket handshake complete");

        Ok(Box::new(WsConnection { stream }))
    }
}

/// One open WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SpeechConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(map_ws_error)
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(map_ws_error(e))),
            };
            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
                Message::Close(close) => Frame::Close(
                    close.map(|c| CloseInfo::new(u16::from(c.code), &*c.reason)),
                ),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }
}

/// Translate a tungstenite error into transport facts.
pub fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            TransportError::Rejected { status, body }
        }
        WsError::Io(e) => map_io_error(&e),
        WsError::Url(e) => TransportError::InvalidRequest(e.to_string()),
        WsError::HttpFormat(e) => TransportError::InvalidRequest(e.to_string()),
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            TransportError::ClosedWithoutCloseFrame
        }
        other => {
            let text = other.to_string();
            if mentions_network(&text) {
                TransportError::Unreachable(text)
            } else {
                TransportError::Other(text)
            }
        }
    }
}

fn map_io_error(err: &io::Error) -> TransportError {
    use io::ErrorKind;

    let text = err.to_string();
    match err.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::AddrNotAvailable
        | ErrorKind::TimedOut
        | ErrorKind::HostUnreachable
        | ErrorKind::NetworkUnreachable => TransportError::Unreachable(text),
        _ if mentions_network(&text) => TransportError::Unreachable(text),
        _ => TransportError::Other(text),
    }
}
