//! Voice settings normalization.
//!
//! Raw preference strings come straight from the host's preference UI and
//! may be empty, non-numeric, or out of range. [`normalize`] turns them into
//! a [`VoiceSettings`] that is always within `[0, 1]` and never fails.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stability used when the raw preference does not parse.
pub const DEFAULT_STABILITY: f32 = 0.5;

/// Similarity boost used when the raw preference does not parse.
pub const DEFAULT_SIMILARITY_BOOST: f32 = 0.75;

/// Voice used when the host does not configure one ("Rachel").
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Bounded voice configuration sent to the synthesis backend.
///
/// Both fields are clamped to `[0, 1]` at construction and cannot be changed
/// afterwards. Deserialization goes through the same clamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVoiceSettings")]
pub struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl VoiceSettings {
    /// Create settings from already-parsed values, clamping both into range.
    ///
    /// A NaN falls back to the field's default.
    pub fn new(stability: f32, similarity_boost: f32) -> Self {
        Self {
            stability: clamp_unit(stability, DEFAULT_STABILITY),
            similarity_boost: clamp_unit(similarity_boost, DEFAULT_SIMILARITY_BOOST),
        }
    }

    pub const fn stability(&self) -> f32 {
        self.stability
    }

    pub const fn similarity_boost(&self) -> f32 {
        self.similarity_boost
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: DEFAULT_STABILITY,
            similarity_boost: DEFAULT_SIMILARITY_BOOST,
        }
    }
}

#[derive(Deserialize)]
struct RawVoiceSettings {
    #[serde(default = "default_stability")]
    stability: f32,
    #[serde(default = "default_similarity_boost")]
    similarity_boost: f32,
}

const fn default_stability() -> f32 {
    DEFAULT_STABILITY
}

const fn default_similarity_boost() -> f32 {
    DEFAULT_SIMILARITY_BOOST
}

impl From<RawVoiceSettings> for VoiceSettings {
    fn from(raw: RawVoiceSettings) -> Self {
        Self::new(raw.stability, raw.similarity_boost)
    }
}

/// Normalize raw preference strings into [`VoiceSettings`].
///
/// Each input is parsed as a float; a parse failure substitutes the field's
/// default *before* clamping, so `"abc"` yields the default while `"7"`
/// yields `1.0`.
pub fn normalize(raw_stability: &str, raw_similarity: &str) -> VoiceSettings {
    VoiceSettings::new(
        parse_or(raw_stability, DEFAULT_STABILITY),
        parse_or(raw_similarity, DEFAULT_SIMILARITY_BOOST),
    )
}

fn parse_or(raw: &str, default: f32) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(value) if !value.is_nan() => value,
        _ => default,
    }
}

fn clamp_unit(value: f32, default: f32) -> f32 {
    if value.is_nan() {
        return default;
    }
    value.clamp(0.0, 1.0)
}

/// Raw user preferences handed over by the host for one invocation.
///
/// Missing fields deserialize as blank, like an untouched preference field.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Backend credential (sent as a request header, never logged).
    pub api_key: String,

    /// Target voice identifier.
    pub voice_id: String,

    /// Stability knob as typed by the user.
    pub stability: String,

    /// Similarity boost knob as typed by the user.
    pub similarity_boost: String,
}

impl Preferences {
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            stability: String::new(),
            similarity_boost: String::new(),
        }
    }

    /// Set the raw stability/similarity strings.
    #[must_use]
    pub fn with_knobs(mut self, stability: impl Into<String>, similarity: impl Into<String>) -> Self {
        self.stability = stability.into();
        self.similarity_boost = similarity.into();
        self
    }

    /// Normalized voice settings for these preferences.
    pub fn voice_settings(&self) -> VoiceSettings {
        normalize(&self.stability, &self.similarity_boost)
    }

    /// The configured voice, or [`DEFAULT_VOICE_ID`] when blank.
    pub fn effective_voice_id(&self) -> &str {
        let voice = self.voice_id.trim();
        if voice.is_empty() {
            DEFAULT_VOICE_ID
        } else {
            voice
        }
    }
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("api_key", &"<redacted>")
            .field("voice_id", &self.voice_id)
            .field("stability", &self.stability)
            .field("similarity_boost", &self.similarity_boost)
            .finish()
    }
}
