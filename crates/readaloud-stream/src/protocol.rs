//! Wire messages for the `stream-input` text-to-speech endpoint.
//!
//! Outbound: one configuration message carrying the whole text, then a
//! `bos` marker and an `eos` marker. Inbound: JSON objects that may carry
//! base64 audio, an `isFinal` flag, or an error report.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use readaloud_core::{SpeakError, TransportError, VoiceSettings};

/// Header carrying the API credential on the upgrade request.
pub const API_KEY_HEADER: &str = "xi-api-key";

/// Build the streaming endpoint URL for a voice and model.
///
/// The voice identifier becomes a path segment, so it is restricted to
/// characters that need no escaping.
pub fn endpoint_url(base_url: &str, voice_id: &str, model_id: &str) -> Result<String, TransportError> {
    let safe = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if !safe(voice_id) {
        return Err(TransportError::InvalidRequest(format!(
            "voice id '{voice_id}' contains unsupported characters"
        )));
    }
    if !safe(model_id) {
        return Err(TransportError::InvalidRequest(format!(
            "model id '{model_id}' contains unsupported characters"
        )));
    }
    Ok(format!(
        "{}/v1/text-to-speech/{voice_id}/stream-input?model_id={model_id}",
        base_url.trim_end_matches('/')
    ))
}

/// First outbound message.
#[derive(Debug, Serialize)]
pub struct InitialMessage<'a> {
    pub text: &'a str,
    pub voice_settings: VoiceSettings,
    pub generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig<'a> {
    pub chunk_length_schedule: &'a [u32],
    pub stream_chunk_size: u32,
}

impl InitialMessage<'_> {
    pub fn to_json(&self) -> Result<String, SpeakError> {
        serde_json::to_string(self)
            .map_err(|e| SpeakError::Protocol(format!("cannot encode configuration: {e}")))
    }
}

/// Stream boundary markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Bos,
    Eos,
}

impl ControlMessage {
    pub fn to_json(self) -> String {
        match self {
            Self::Bos => r#"{"type":"bos"}"#,
            Self::Eos => r#"{"type":"eos"}"#,
        }
        .to_string()
    }
}

/// One inbound message. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub audio: Option<String>,

    #[serde(default)]
    pub is_final: Option<bool>,

    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub message: Option<Value>,
}

impl InboundMessage {
    /// Parse a text frame. Anything that is not a JSON object is a protocol error.
    pub fn parse(text: &str) -> Result<Self, SpeakError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            SpeakError::Protocol(format!("unparseable message ({e}): {}", truncate(text)))
        })?;
        if !value.is_object() {
            return Err(SpeakError::Protocol(format!(
                "expected a JSON object: {}",
                truncate(text)
            )));
        }
        serde_json::from_value(value).map_err(|e| {
            SpeakError::Protocol(format!("malformed message ({e}): {}", truncate(text)))
        })
    }

    pub fn is_final(&self) -> bool {
        self.is_final.unwrap_or(false)
    }

    /// Decoded audio payload; `None` when the message carries no audio.
    pub fn decode_audio(&self) -> Result<Option<Vec<u8>>, SpeakError> {
        match self.audio.as_deref() {
            None | Some("") => Ok(None),
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| SpeakError::Protocol(format!("invalid base64 audio: {e}"))),
        }
    }

    /// Error report carried by the message, if any.
    ///
    /// A `message` field alone is informational; only a non-null `error`
    /// marks a failure.
    pub fn error_report(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|v| !v.is_null())?;
        let error = render(error);
        match self.message.as_ref().filter(|v| !v.is_null()).map(render) {
            Some(message) if message != error => Some(format!("{error}: {message}")),
            _ => Some(error),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readaloud_core::DEFAULT_CHUNK_LENGTH_SCHEDULE;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_initial_message_wire_format() {
        let msg = InitialMessage {
            text: "Hello world",
            voice_settings: VoiceSettings::default(),
            generation_config: GenerationConfig {
                chunk_length_schedule: &DEFAULT_CHUNK_LENGTH_SCHEDULE,
                stream_chunk_size: 8192,
            },
        };
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"text":"Hello world","voice_settings":{"stability":0.5,"similarity_boost":0.75},"generation_config":{"chunk_length_schedule":[120,160,250,290],"stream_chunk_size":8192}}"#
        );
    }

    #[test]
    fn test_control_messages_match_serde() {
        for marker in [ControlMessage::Bos, ControlMessage::Eos] {
            assert_eq!(marker.to_json(), serde_json::to_string(&marker).unwrap());
        }
        assert_eq!(ControlMessage::Bos.to_json(), r#"{"type":"bos"}"#);
        assert_eq!(ControlMessage::Eos.to_json(), r#"{"type":"eos"}"#);
    }

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url("wss://api.elevenlabs.io/", "21m00Tcm4TlvDq8ikWAM", "eleven_monolingual_v1")
            .unwrap();
        assert_eq!(
            url,
            "wss://api.elevenlabs.io/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM/stream-input?model_id=eleven_monolingual_v1"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_unsafe_voice() {
        let err = endpoint_url("wss://x", "../admin?", "m").unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn test_audio_message_decodes() {
        let msg = InboundMessage::parse(r#"{"audio":"QUJD","isFinal":null}"#).unwrap();
        assert_eq!(msg.decode_audio().unwrap(), Some(b"ABC".to_vec()));
        assert!(!msg.is_final());
        assert!(msg.error_report().is_none());
    }

    #[test]
    fn test_message_without_audio_is_noop() {
        let msg = InboundMessage::parse(r#"{"alignment":null}"#).unwrap();
        assert_eq!(msg.decode_audio().unwrap(), None);
        assert!(!msg.is_final());

        let msg = InboundMessage::parse(r#"{"audio":null,"isFinal":true}"#).unwrap();
        assert_eq!(msg.decode_audio().unwrap(), None);
        assert!(msg.is_final());
    }

    #[test]
    fn test_malformed_messages_are_protocol_errors() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(SpeakError::Protocol(_))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"audio":"%%%"}"#).unwrap().decode_audio(),
            Err(SpeakError::Protocol(_))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"audio":42}"#),
            Err(SpeakError::Protocol(_))
        ));
    }

    #[test]
    fn test_non_object_json_is_protocol_error() {
        for text in ["[]", "[1,2]", r#""audio""#, "42", "null", "true"] {
            let err = assert_err!(InboundMessage::parse(text), "input {text}");
            assert!(matches!(err, SpeakError::Protocol(_)), "input {text}");
        }
        let empty = assert_ok!(InboundMessage::parse("{}"));
        assert_eq!(assert_ok!(empty.decode_audio()), None);
        assert!(!empty.is_final());
    }

    #[test]
    fn test_error_report() {
        let msg = InboundMessage::parse(
            r#"{"error":"invalid_api_key","message":"Invalid API key provided"}"#,
        )
        .unwrap();
        assert_eq!(
            msg.error_report().as_deref(),
            Some("invalid_api_key: Invalid API key provided")
        );

        let msg = InboundMessage::parse(r#"{"message":"ok","error":null}"#).unwrap();
        assert!(msg.error_report().is_none());
    }
}
