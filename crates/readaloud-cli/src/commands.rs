//! Subcommands and the options shared by them.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use readaloud_core::{ConfigError, PipelineConfig, PlaybackStrategy, PlayerCommand, Preferences};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak TEXT (or standard input when TEXT is omitted)
    Speak {
        /// Text to speak
        text: Option<String>,

        #[command(flatten)]
        options: PipelineOptions,
    },

    /// Print the effective configuration (API key redacted)
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: PipelineOptions,
    },
}

/// Preferences and pipeline overrides, from flags or the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Backend API key
    #[arg(long = "api-key", env = "ELEVENLABS_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Voice identifier (blank selects the default voice)
    #[arg(long = "voice", env = "READALOUD_VOICE_ID", default_value = "")]
    pub voice_id: String,

    /// Voice stability, 0.0-1.0
    #[arg(long, env = "READALOUD_STABILITY", default_value = "")]
    pub stability: String,

    /// Similarity boost, 0.0-1.0
    #[arg(long = "similarity", env = "READALOUD_SIMILARITY", default_value = "")]
    pub similarity_boost: String,

    /// Synthesis model identifier
    #[arg(long = "model", env = "READALOUD_MODEL_ID")]
    pub model_id: Option<String>,

    /// Player command line; `{path}` is replaced by the audio file
    #[arg(long, env = "READALOUD_PLAYER")]
    pub player: Option<String>,

    /// Start the player only after all audio has arrived
    #[arg(long)]
    pub buffered: bool,

    /// Directory for the temporary audio file
    #[arg(long = "temp-dir", env = "READALOUD_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
}

impl PipelineOptions {
    /// Raw preferences as a host would hand them over.
    pub fn preferences(&self) -> Preferences {
        Preferences::new(&self.api_key, &self.voice_id)
            .with_knobs(&self.stability, &self.similarity_boost)
    }

    /// Validated pipeline configuration with these overrides applied.
    ///
    /// A custom player streams unless `--buffered` is given; the platform
    /// default player keeps its own strategy.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = PipelineConfig::default();
        if let Some(model_id) = &self.model_id {
            config = config.with_model_id(model_id.trim());
        }
        if let Some(player) = &self.player {
            config = config.with_player(PlayerCommand::parse(player)?, PlaybackStrategy::Streaming);
        }
        if self.buffered {
            config.playback = PlaybackStrategy::Buffered;
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}
