//! One request/response exchange with the synthesis backend.
//!
//! [`StreamSession`] is an explicit state machine. Each inbound frame is
//! handled to completion before the next one is read, and every failure path
//! closes the connection before the classified error is returned.

use std::fmt;
use std::sync::Arc;

use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use readaloud_core::{
    ConnectTarget, Frame, PipelineConfig, SpeakError, SpeechConnection, SpeechConnector,
    TransportError, VoiceSettings,
};

use crate::protocol::{ControlMessage, GenerationConfig, InboundMessage, InitialMessage, endpoint_url};

/// Connection state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Configuration and stream markers sent; no audio yet.
    Configured,
    /// At least one audio chunk received.
    Streaming,
    /// Final message seen; the connection is being closed from this side.
    Draining,
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What to synthesize, for whom.
#[derive(Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub api_key: String,
    pub settings: VoiceSettings,
}

impl fmt::Debug for SynthesisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisRequest")
            .field("text_len", &self.text.len())
            .field("voice_id", &self.voice_id)
            .field("api_key", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Output of [`StreamSession::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One decoded, non-empty audio chunk, in arrival order.
    Audio(Vec<u8>),
    /// The backend finished; no more audio will arrive.
    Finished,
}

/// One synthesis exchange.
pub struct StreamSession {
    request: SynthesisRequest,
    config: Arc<PipelineConfig>,
    state: SessionState,
    connection: Option<Box<dyn SpeechConnection>>,
    chunks_received: usize,
    first_chunk_deadline: Option<Instant>,
    final_pending: bool,
    finished: bool,
    /// Classified failure not yet handed to the caller.
    failure: Option<SpeakError>,
}

impl StreamSession {
    pub fn new(request: SynthesisRequest, config: Arc<PipelineConfig>) -> Self {
        Self {
            request,
            config,
            state: SessionState::Idle,
            connection: None,
            chunks_received: 0,
            first_chunk_deadline: None,
            final_pending: false,
            finished: false,
            failure: None,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    /// Whether the backend has finished sending audio.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take a failure whose `next_event` call was dropped before it could
    /// return the error.
    pub fn take_failure(&mut self) -> Option<SpeakError> {
        self.failure.take()
    }

    /// Connect, then send the configuration message and both stream markers.
    ///
    /// The handshake is bounded by `connect_timeout`. On success the session
    /// is `Configured` and the first-chunk deadline starts running.
    pub async fn open(&mut self, connector: &dyn SpeechConnector) -> Result<(), SpeakError> {
        if self.state != SessionState::Idle {
            return Err(SpeakError::Protocol(format!(
                "cannot open a session that is {}",
                self.state
            )));
        }

        let url = match endpoint_url(
            &self.config.base_url,
            &self.request.voice_id,
            &self.config.model_id,
        ) {
            Ok(url) => url,
            Err(e) => return Err(self.fail(e.into()).await),
        };

        self.transition(SessionState::Connecting);
        debug!(url = %url, voice = %self.request.voice_id, "Connecting to speech service");

        let target = ConnectTarget::new(url, self.request.api_key.clone());
        let connection = match timeout(self.config.connect_timeout, connector.connect(&target)).await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Err(self.fail(e.into()).await),
            Err(_) => {
                return Err(self
                    .fail(TransportError::TimedOut("connection handshake").into())
                    .await);
            }
        };
        self.connection = Some(connection);

        if let Err(e) = self.send_configuration().await {
            return Err(self.fail(e).await);
        }

        self.first_chunk_deadline = Some(Instant::now() + self.config.first_chunk_timeout);
        self.transition(SessionState::Configured);
        Ok(())
    }

    async fn send_configuration(&mut self) -> Result<(), SpeakError> {
        let initial = InitialMessage {
            text: &self.request.text,
            voice_settings: self.request.settings,
            generation_config: GenerationConfig {
                chunk_length_schedule: &self.config.chunk_length_schedule,
                stream_chunk_size: self.config.stream_chunk_size,
            },
        }
        .to_json()?;

        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| SpeakError::Backend("connection is not open".to_string()))?;
        connection.send_text(initial).await?;
        connection.send_text(ControlMessage::Bos.to_json()).await?;
        connection.send_text(ControlMessage::Eos.to_json()).await?;
        Ok(())
    }

    /// Wait for the next audio chunk or the end of the stream.
    ///
    /// Messages without audio are skipped. A message carrying both audio and
    /// the final flag yields the audio first and `Finished` on the next call,
    /// so the caller can finish writing that chunk before the session
    /// resolves. Cancel-safe while waiting for a frame.
    pub async fn next_event(&mut self) -> Result<SessionEvent, SpeakError> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        loop {
            match self.state {
                SessionState::Configured | SessionState::Streaming => {}
                SessionState::Draining => return Ok(SessionEvent::Finished),
                SessionState::Closed if self.finished => return Ok(SessionEvent::Finished),
                other => {
                    return Err(SpeakError::Backend(format!(
                        "session is {other}, no audio can be received"
                    )));
                }
            }

            if self.final_pending {
                self.final_pending = false;
                self.drain().await;
                return Ok(SessionEvent::Finished);
            }

            let frame = match self.read_frame().await {
                Ok(frame) => frame,
                Err(e) => return Err(self.fail(e.into()).await),
            };

            match frame {
                Frame::Text(text) => {
                    if let Some(chunk) = self.handle_text(&text).await? {
                        return Ok(SessionEvent::Audio(chunk));
                    }
                }
                Frame::Binary(bytes) => {
                    let err = SpeakError::Protocol(format!(
                        "unexpected binary frame of {} bytes",
                        bytes.len()
                    ));
                    return Err(self.fail(err).await);
                }
                Frame::Close(Some(info)) if !info.is_normal() => {
                    let err = TransportError::Closed {
                        code: info.code,
                        reason: info.reason,
                    };
                    return Err(self.fail(err.into()).await);
                }
                Frame::Close(_) => {
                    warn!(
                        chunks = self.chunks_received,
                        "Speech service closed the stream before the final message"
                    );
                    self.drain().await;
                    return Ok(SessionEvent::Finished);
                }
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let (deadline, waiting_for) = if self.chunks_received == 0 {
            (self.first_chunk_deadline, "first audio chunk")
        } else {
            (
                self.config.idle_timeout.map(|idle| Instant::now() + idle),
                "next audio chunk",
            )
        };

        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::ClosedWithoutCloseFrame)?;

        let next = match deadline {
            Some(deadline) => timeout_at(deadline, connection.next_frame())
                .await
                .map_err(|_| TransportError::TimedOut(waiting_for))?,
            None => connection.next_frame().await,
        };

        next.unwrap_or(Err(TransportError::ClosedWithoutCloseFrame))
    }

    /// Handle one text frame. Returns a chunk to hand to the caller, if any.
    async fn handle_text(&mut self, text: &str) -> Result<Option<Vec<u8>>, SpeakError> {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => return Err(self.fail(e).await),
        };

        if let Some(report) = message.error_report() {
            return Err(self.fail(SpeakError::from_backend_report(&report)).await);
        }

        let audio = match message.decode_audio() {
            Ok(audio) => audio,
            Err(e) => return Err(self.fail(e).await),
        };

        if message.is_final() {
            self.final_pending = true;
        }

        match audio {
            Some(bytes) if !bytes.is_empty() => {
                self.chunks_received += 1;
                if self.state == SessionState::Configured {
                    self.transition(SessionState::Streaming);
                }
                debug!(chunk = self.chunks_received, bytes = bytes.len(), "Audio chunk received");
                Ok(Some(bytes))
            }
            _ => Ok(None),
        }
    }

    /// Close from this side after the backend is done.
    async fn drain(&mut self) {
        self.finished = true;
        self.transition(SessionState::Draining);
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!(error = %e, "Close after final message failed");
            }
        }
        info!(chunks = self.chunks_received, "Speech stream finished");
    }

    /// Enter `Failed`, close the connection best-effort, and hand back `err`.
    async fn fail(&mut self, err: SpeakError) -> SpeakError {
        warn!(state = %self.state, error = %err, "Stream session failed");
        self.transition(SessionState::Failed);
        // Kept until the close completes so a dropped caller can still collect it.
        self.failure = Some(err);
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!(error = %e, "Close after failure also failed");
            }
        }
        self.failure
            .take()
            .unwrap_or_else(|| SpeakError::Backend("session failure was already reported".to_string()))
    }

    /// Release the connection and enter `Closed`. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!(error = %e, "Connection close failed");
            }
        }
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state transition");
            self.state = next;
        }
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("request", &self.request)
            .field("state", &self.state)
            .field("connected", &self.connection.is_some())
            .field("chunks_received", &self.chunks_received)
            .finish_non_exhaustive()
    }
}
