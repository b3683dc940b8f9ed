//! Audio sink: buffer writes, one player start, and buffer deletion.
//!
//! Under [`PlaybackStrategy::Streaming`] the player starts on the first
//! appended chunk and follows the file as it grows. Under
//! [`PlaybackStrategy::Buffered`] it starts once the stream is finished.
//! Either way the player is started at most once and never against an
//! empty file.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use readaloud_core::{AudioPlayer, PipelineConfig, PlaybackHandle, PlaybackStrategy, SpeakError};

use crate::buffer::AudioBuffer;

enum Playback {
    Idle,
    Playing(Box<dyn PlaybackHandle>),
    Finished,
}

/// Owns the audio buffer and the player for one invocation.
pub struct AudioSink {
    buffer: AudioBuffer,
    player: Arc<dyn AudioPlayer>,
    strategy: PlaybackStrategy,
    playback: Playback,
    chunks: usize,
    player_started: bool,
}

impl AudioSink {
    /// Create a sink with a fresh, uniquely named buffer.
    pub fn create(player: Arc<dyn AudioPlayer>, config: &PipelineConfig) -> Result<Self, SpeakError> {
        let buffer = AudioBuffer::create(config.temp_dir.as_deref())?;
        Ok(Self {
            buffer,
            player,
            strategy: config.playback,
            playback: Playback::Idle,
            chunks: 0,
            player_started: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.buffer.path()
    }

    pub const fn bytes_written(&self) -> u64 {
        self.buffer.bytes_written()
    }

    pub const fn chunks(&self) -> usize {
        self.chunks
    }

    pub const fn is_playing(&self) -> bool {
        matches!(self.playback, Playback::Playing(_))
    }

    /// Whether the player was ever started.
    pub const fn player_started(&self) -> bool {
        self.player_started
    }

    /// Append one decoded chunk. Returns `true` when this call started the
    /// player. Empty chunks are ignored.
    ///
    /// Audio arriving after the player exited and the buffer was deleted can
    /// never be heard, so it fails with a playback error.
    pub async fn append_chunk(&mut self, chunk: &[u8]) -> Result<bool, SpeakError> {
        if chunk.is_empty() {
            return Ok(false);
        }
        if self.buffer.is_released() {
            debug!(bytes = chunk.len(), "Player already finished, chunk cannot be played");
            return Err(SpeakError::Playback(
                "player exited before the stream finished".to_string(),
            ));
        }
        self.buffer.append(chunk).await?;
        self.chunks += 1;
        self.on_chunk_appended()
    }

    fn on_chunk_appended(&mut self) -> Result<bool, SpeakError> {
        match (self.strategy, &self.playback) {
            (PlaybackStrategy::Streaming, Playback::Idle) => {
                self.start_player()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The stream has ended. Starts the player if it has not started yet.
    ///
    /// Fails with a backend error when no audio was ever written.
    pub fn finish_stream(&mut self) -> Result<bool, SpeakError> {
        if self.buffer.bytes_written() == 0 {
            return Err(SpeakError::Backend("no audio received".to_string()));
        }
        if matches!(self.playback, Playback::Idle) {
            self.start_player()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn start_player(&mut self) -> Result<(), SpeakError> {
        if self.buffer.bytes_written() == 0 {
            return Err(SpeakError::Backend("no audio received".to_string()));
        }
        // A failed start is final: the player is never retried.
        self.playback = Playback::Finished;
        let handle = self.player.start(self.buffer.path())?;
        self.player_started = true;
        info!(
            chunks = self.chunks,
            bytes = self.buffer.bytes_written(),
            path = %self.buffer.path().display(),
            "Playback started"
        );
        self.playback = Playback::Playing(handle);
        Ok(())
    }

    /// Wait for the player to exit, then delete the buffer.
    ///
    /// Returns immediately if the player is not running. Cancel-safe.
    pub async fn wait_for_exit(&mut self) -> Result<(), SpeakError> {
        let Playback::Playing(handle) = &mut self.playback else {
            return Ok(());
        };
        let result = handle.wait().await;
        self.playback = Playback::Finished;
        self.buffer.release();
        result.map_err(SpeakError::from)
    }

    /// Stop the player if it is running and delete the buffer. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Playback::Playing(mut handle) =
            std::mem::replace(&mut self.playback, Playback::Finished)
        {
            debug!("Stopping player");
            handle.stop().await;
        }
        self.buffer.release();
    }
}
