//! Immutable pipeline configuration.
//!
//! A [`PipelineConfig`] is built once (by the host or CLI), validated, and
//! shared read-only across invocations via `Arc`. Nothing in the pipeline
//! mutates it, so concurrent invocations never observe each other's
//! settings.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default synthesis backend (WebSocket origin).
pub const DEFAULT_BASE_URL: &str = "wss://api.elevenlabs.io";

/// Default synthesis model.
pub const DEFAULT_MODEL_ID: &str = "eleven_monolingual_v1";

/// Ascending text-length thresholds that front-load a small first chunk.
pub const DEFAULT_CHUNK_LENGTH_SCHEDULE: [u32; 4] = [120, 160, 250, 290];

/// Target transport chunk size in bytes.
pub const DEFAULT_STREAM_CHUNK_SIZE: u32 = 8192;

/// Length of the text preview used in notifications.
pub const DEFAULT_PREVIEW_CHARS: usize = 50;

/// Shortest preview that still fits one character and the ellipsis.
pub const MIN_PREVIEW_CHARS: usize = 4;

/// Default upper bound on the gap between stream messages. The default
/// `ffplay` invocation gives up reading after the same interval.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Placeholder in player arguments that is replaced by the buffer path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// When the local player is started relative to the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStrategy {
    /// Start the player on the first appended chunk; the player follows the
    /// growing file.
    Streaming,

    /// Start the player only once the stream has drained. For players that
    /// cannot follow a growing file.
    Buffered,
}

impl PlaybackStrategy {
    /// Default strategy for the platform's default player.
    pub const fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Buffered
        } else {
            Self::Streaming
        }
    }
}

/// External player invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCommand {
    /// Executable name or path.
    pub program: String,

    /// Arguments; [`PATH_PLACEHOLDER`] is replaced by the buffer path. When
    /// no argument contains the placeholder, the path is appended.
    pub args: Vec<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `"mpv --no-video {path}"`.
    pub fn parse(command_line: &str) -> Result<Self, ConfigError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyPlayerCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Platform default player.
    ///
    /// macOS ships `afplay`, which reads the whole file up front. Elsewhere
    /// `ffplay` is used with `-follow` so it keeps reading as the buffer grows,
    /// and `-rw_timeout` ends playback once no more data arrives. That read
    /// timeout matches [`DEFAULT_IDLE_TIMEOUT`], so a slow stream fails the
    /// session before the player gives up on the file.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", vec![PATH_PLACEHOLDER.to_string()])
        } else {
            let rw_timeout_us = DEFAULT_IDLE_TIMEOUT.as_micros().to_string();
            let mut args: Vec<String> = ["-nodisp", "-autoexit", "-loglevel", "error", "-follow", "1"]
                .into_iter()
                .map(str::to_string)
                .collect();
            args.extend(["-rw_timeout".to_string(), rw_timeout_us, PATH_PLACEHOLDER.to_string()]);
            Self::new("ffplay", args)
        }
    }

    /// Arguments with the placeholder substituted for `path`.
    pub fn args_for(&self, path: &Path) -> Vec<OsString> {
        let mut substituted = false;
        let mut args: Vec<OsString> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PATH_PLACEHOLDER) {
                    substituted = true;
                    OsString::from(arg.replace(PATH_PLACEHOLDER, &path.to_string_lossy()))
                } else {
                    OsString::from(arg)
                }
            })
            .collect();
        if !substituted {
            args.push(path.as_os_str().to_os_string());
        }
        args
    }
}

/// Configuration for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Backend WebSocket origin, e.g. `wss://api.elevenlabs.io`.
    pub base_url: String,

    /// Synthesis model identifier (sent as the `model_id` query parameter).
    pub model_id: String,

    /// Ascending chunk-length schedule embedded in the first message.
    pub chunk_length_schedule: Vec<u32>,

    /// Target transport chunk size embedded in the first message.
    pub stream_chunk_size: u32,

    /// Upper bound on the connection handshake.
    pub connect_timeout: Duration,

    /// Upper bound on the wait for the first audio chunk.
    pub first_chunk_timeout: Duration,

    /// Upper bound on the gap between later messages (`None` = unbounded).
    pub idle_timeout: Option<Duration>,

    /// Number of characters kept in notification previews.
    pub preview_chars: usize,

    /// When the player is started.
    pub playback: PlaybackStrategy,

    /// External player invocation.
    pub player: PlayerCommand,

    /// Directory for audio buffers (`None` = system temp dir).
    pub temp_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            chunk_length_schedule: DEFAULT_CHUNK_LENGTH_SCHEDULE.to_vec(),
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(10),
            first_chunk_timeout: Duration::from_secs(15),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            playback: PlaybackStrategy::platform_default(),
            player: PlayerCommand::platform_default(),
            temp_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Set the model identifier.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the player command and the strategy it supports.
    #[must_use]
    pub fn with_player(mut self, player: PlayerCommand, playback: PlaybackStrategy) -> Self {
        self.player = player;
        self.playback = playback;
        self
    }

    /// Set the directory used for audio buffers.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(self.base_url.starts_with("ws://") || self.base_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidScheme(self.base_url.clone()));
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::EmptyModelId);
        }
        if self.chunk_length_schedule.is_empty()
            || self.chunk_length_schedule.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::InvalidSchedule(self.chunk_length_schedule.clone()));
        }
        if self.stream_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.connect_timeout.is_zero()
            || self.first_chunk_timeout.is_zero()
            || self.idle_timeout.is_some_and(|t| t.is_zero())
        {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.preview_chars < MIN_PREVIEW_CHARS {
            return Err(ConfigError::PreviewTooShort(self.preview_chars));
        }
        if self.player.program.trim().is_empty() {
            return Err(ConfigError::EmptyPlayerCommand);
        }
        Ok(())
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Backend URL cannot be empty")]
    EmptyBaseUrl,

    #[error("Backend URL must use ws:// or wss://, got {0}")]
    InvalidScheme(String),

    #[error("Model id cannot be empty")]
    EmptyModelId,

    #[error("Chunk length schedule must be non-empty and strictly ascending, got {0:?}")]
    InvalidSchedule(Vec<u32>),

    #[error("Stream chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("Timeouts must be greater than zero")]
    ZeroTimeout,

    #[error("Preview length must be at least 4 characters, got {0}")]
    PreviewTooShort(usize),

    #[error("Player command cannot be empty")]
    EmptyPlayerCommand,
}
