//! Speech pipeline orchestrator.
//!
//! ```text
//!   Checking → Processing(words) → open session → chunks → Speaking → player exit → Succeeded
//!                                      │                                   │
//!                                      └──────── any failure / cancel ─────┴──→ cleanup → Failed
//! ```
//!
//! One [`SpeechPipeline::speak`] call owns exactly one stream session and one
//! audio sink. Cleanup (connection close, player stop, buffer deletion) runs
//! on every exit path before the result is returned, and exactly one
//! terminal event is emitted per call.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use readaloud_core::{
    AudioPlayer, ConfigError, PipelineConfig, PipelineEvent, Preferences, ProgressEmitter,
    SpeakError, SpeechConnector, preview, validate_selection, word_count,
};
use readaloud_playback::{AudioSink, ProcessPlayer};
use readaloud_stream::{SessionEvent, StreamSession, SynthesisRequest, WsConnector};

/// Input for one invocation.
#[derive(Debug, Clone)]
pub struct SpeakRequest {
    /// Selected text, as received from the host.
    pub text: String,
    /// Raw host preferences.
    pub preferences: Preferences,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>, preferences: Preferences) -> Self {
        Self {
            text: text.into(),
            preferences,
        }
    }
}

/// Summary of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakOutcome {
    /// Audio chunks written to the buffer.
    pub chunks: usize,
    /// Audio bytes written to the buffer.
    pub bytes: u64,
    /// Truncated text shown in notifications.
    pub preview: String,
}

/// Drives text → stream session → audio sink for one invocation at a time.
pub struct SpeechPipeline {
    config: Arc<PipelineConfig>,
    connector: Arc<dyn SpeechConnector>,
    player: Arc<dyn AudioPlayer>,
    emitter: Arc<dyn ProgressEmitter>,
}

impl SpeechPipeline {
    /// Create a pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        connector: Arc<dyn SpeechConnector>,
        player: Arc<dyn AudioPlayer>,
        emitter: Arc<dyn ProgressEmitter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector,
            player,
            emitter,
        })
    }

    /// Create a pipeline using the WebSocket connector and the configured
    /// external player.
    pub fn standard(
        config: PipelineConfig,
        emitter: Arc<dyn ProgressEmitter>,
    ) -> Result<Self, ConfigError> {
        let player = Arc::new(ProcessPlayer::new(config.player.clone()));
        Self::new(config, Arc::new(WsConnector::new()), player, emitter)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Speak `request.text`, resolving when playback has finished.
    ///
    /// Cancelling `cancel` stops the invocation at the next suspension point
    /// and returns [`SpeakError::Cancelled`] after cleanup.
    pub async fn speak(
        &self,
        request: SpeakRequest,
        cancel: CancellationToken,
    ) -> Result<SpeakOutcome, SpeakError> {
        self.emitter.emit(PipelineEvent::Checking);

        let result = self.run(&request, &cancel).await;
        match &result {
            Ok(outcome) => {
                info!(
                    chunks = outcome.chunks,
                    bytes = outcome.bytes,
                    "Speech finished"
                );
                self.emitter.emit(PipelineEvent::Succeeded {
                    preview: outcome.preview.clone(),
                });
            }
            Err(SpeakError::Cancelled) => {
                info!("Speech cancelled");
                self.emitter.emit(PipelineEvent::Cancelled);
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "Speech failed");
                self.emitter.emit(PipelineEvent::from_error(err));
            }
        }
        result
    }

    async fn run(
        &self,
        request: &SpeakRequest,
        cancel: &CancellationToken,
    ) -> Result<SpeakOutcome, SpeakError> {
        let text = validate_selection(&request.text)?;
        let prefs = &request.preferences;
        if prefs.api_key.trim().is_empty() {
            return Err(SpeakError::InvalidCredential(
                "no API key configured".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(SpeakError::Cancelled);
        }

        let preview = preview(text, self.config.preview_chars);
        self.emitter.emit(PipelineEvent::Processing {
            words: word_count(text),
        });

        let synthesis = SynthesisRequest {
            text: text.to_string(),
            voice_id: prefs.effective_voice_id().to_string(),
            api_key: prefs.api_key.trim().to_string(),
            settings: prefs.voice_settings(),
        };
        debug!(request = ?synthesis, "Starting speech");

        let mut session = StreamSession::new(synthesis, Arc::clone(&self.config));
        let mut sink = AudioSink::create(Arc::clone(&self.player), &self.config)?;

        let result = self.drive(&mut session, &mut sink, &preview, cancel).await;

        session.close().await;
        sink.shutdown().await;

        result.map(|()| SpeakOutcome {
            chunks: sink.chunks(),
            bytes: sink.bytes_written(),
            preview,
        })
    }

    async fn drive(
        &self,
        session: &mut StreamSession,
        sink: &mut AudioSink,
        preview: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SpeakError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SpeakError::Cancelled),
            opened = session.open(self.connector.as_ref()) => opened?,
        }

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SpeakError::Cancelled),
                event = session.next_event() => event?,
                exited = sink.wait_for_exit(), if sink.is_playing() => {
                    // A failure classified by an interrupted read wins over the exit.
                    if let Some(err) = session.take_failure() {
                        return Err(err);
                    }
                    exited?;
                    if session.is_finished() {
                        break;
                    }
                    return Err(SpeakError::Playback(
                        "player exited before the stream finished".to_string(),
                    ));
                }
            };

            match event {
                SessionEvent::Audio(chunk) => {
                    if sink.append_chunk(&chunk).await? {
                        self.emit_speaking(preview);
                    }
                }
                SessionEvent::Finished => break,
            }
        }

        if sink.finish_stream()? {
            self.emit_speaking(preview);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SpeakError::Cancelled),
            exited = sink.wait_for_exit() => exited,
        }
    }

    fn emit_speaking(&self, preview: &str) {
        self.emitter.emit(PipelineEvent::Speaking {
            preview: preview.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use readaloud_core::testing::{RecordingEmitter, RecordingPlayer, ScriptedConnector, Step};
    use readaloud_core::{ErrorKind, NoopEmitter};
    use tokio_test::assert_err;

    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            chunk_length_schedule: vec![250, 120],
            ..PipelineConfig::default()
        };
        let result = SpeechPipeline::new(
            config,
            Arc::new(ScriptedConnector::default()),
            Arc::new(RecordingPlayer::succeeding()),
            Arc::new(NoopEmitter::new()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidSchedule(_))));
    }

    #[tokio::test]
    async fn test_empty_text_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let connector = ScriptedConnector::accepting([Step::Hang]);
        let emitter = Arc::new(RecordingEmitter::new());
        let pipeline = SpeechPipeline::new(
            PipelineConfig::default().with_temp_dir(dir.path()),
            Arc::new(connector.clone()),
            Arc::new(RecordingPlayer::succeeding()),
            emitter.clone(),
        )
        .unwrap();

        let err = assert_err!(
            pipeline
                .speak(
                    SpeakRequest::new("  \n ", Preferences::new("sk", "")),
                    CancellationToken::new(),
                )
                .await
        );

        assert_eq!(err.kind(), ErrorKind::EmptyText);
        assert_eq!(connector.log().connects, 0);
        assert_eq!(emitter.terminal_count(), 1);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_connecting() {
        let connector = ScriptedConnector::accepting([Step::Hang]);
        let pipeline = SpeechPipeline::new(
            PipelineConfig::default(),
            Arc::new(connector.clone()),
            Arc::new(RecordingPlayer::succeeding()),
            Arc::new(NoopEmitter::new()),
        )
        .unwrap();

        let err = assert_err!(
            pipeline
                .speak(
                    SpeakRequest::new("Hello", Preferences::new("   ", "")),
                    CancellationToken::new(),
                )
                .await
        );

        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert_eq!(connector.log().connects, 0);
    }
}
