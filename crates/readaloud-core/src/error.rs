//! Error taxonomy for the speech pipeline.
//!
//! Transport adapters report what happened as a [`TransportError`];
//! [`classify_transport_error`] is the single place that turns those facts
//! into the user-facing [`SpeakError`] categories.

use std::io;

use serde::{Deserialize, Serialize};

/// Category of a [`SpeakError`], used for notifications and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredential,
    NetworkUnavailable,
    BackendError,
    PlaybackFailure,
    ProtocolError,
    EmptyText,
    Storage,
    Cancelled,
}

/// Errors that terminate one speak invocation.
#[derive(Debug, thiserror::Error)]
pub enum SpeakError {
    /// The backend rejected the credential.
    #[error("Invalid API key: {0}")]
    InvalidCredential(String),

    /// DNS or connectivity failure.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Any other failure reported by the transport or backend.
    #[error("Speech service error: {0}")]
    Backend(String),

    /// The local player failed.
    #[error("Audio playback failed: {0}")]
    Playback(String),

    /// An inbound message could not be understood.
    #[error("Malformed message from speech service: {0}")]
    Protocol(String),

    /// The selection was empty or whitespace only.
    #[error("No text selected")]
    EmptyText,

    /// The audio buffer could not be created or written.
    #[error("Audio buffer error: {0}")]
    Storage(#[from] io::Error),

    /// The invocation was cancelled or superseded.
    #[error("Speech cancelled")]
    Cancelled,
}

impl SpeakError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::Backend(_) => ErrorKind::BackendError,
            Self::Playback(_) => ErrorKind::PlaybackFailure,
            Self::Protocol(_) => ErrorKind::ProtocolError,
            Self::EmptyText => ErrorKind::EmptyText,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Message shown to the user, with guidance where there is any.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredential(detail) => format!(
                "Invalid API key ({detail}). Check the API key in your preferences."
            ),
            Self::NetworkUnavailable(detail) => format!(
                "Cannot reach the speech service ({detail}). Check your internet connection."
            ),
            Self::Playback(detail) => format!(
                "Audio playback failed on this machine ({detail}). The speech service was not at fault."
            ),
            other => other.to_string(),
        }
    }

    /// Classify an error report carried inside an inbound backend message.
    pub fn from_backend_report(report: &str) -> Self {
        if mentions_auth(report) {
            Self::InvalidCredential(report.to_string())
        } else {
            Self::Backend(report.to_string())
        }
    }
}

/// Transport-level failure facts, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server answered the upgrade request with a non-101 status.
    #[error("handshake rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The credential could not be presented.
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    /// DNS resolution or TCP connect failed.
    #[error("{0}")]
    Unreachable(String),

    /// The peer closed the connection with a non-normal code.
    #[error("connection closed with code {code}: {reason}")]
    Closed { code: u16, reason: String },

    /// The stream ended without a close frame.
    #[error("connection closed without a close frame")]
    ClosedWithoutCloseFrame,

    /// A bounded wait expired.
    #[error("timed out waiting for {0}")]
    TimedOut(&'static str),

    /// The request could not be built (bad URL, bad voice id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

/// Map a transport failure onto the user-facing taxonomy.
pub fn classify_transport_error(err: TransportError) -> SpeakError {
    match err {
        TransportError::Rejected {
            status: status @ (401 | 403),
            body,
        } => {
            let detail = if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body
            };
            SpeakError::InvalidCredential(detail)
        }
        TransportError::Rejected { status, body } if mentions_auth(&body) => {
            SpeakError::InvalidCredential(format!("HTTP {status}: {body}"))
        }
        TransportError::Unauthorized(detail) => SpeakError::InvalidCredential(detail),
        TransportError::Closed { ref reason, .. } if mentions_auth(reason) => {
            SpeakError::InvalidCredential(reason.clone())
        }
        TransportError::Unreachable(detail) => SpeakError::NetworkUnavailable(detail),
        TransportError::Other(detail) if mentions_network(&detail) => {
            SpeakError::NetworkUnavailable(detail)
        }
        other => SpeakError::Backend(other.to_string()),
    }
}

fn mentions_auth(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    [
        "api key",
        "api_key",
        "xi-api-key",
        "unauthorized",
        "unauthorised",
        "authentication",
        "auth_error",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Heuristic for DNS/connectivity wording in otherwise opaque errors.
pub fn mentions_network(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    [
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
        "no such host",
        "temporary failure in name resolution",
        "dns error",
        "network is unreachable",
        "connection refused",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Failures of the local player.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The player executable could not be started.
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The player exited unsuccessfully.
    #[error("player exited with {}{}", exit_description(.code), stderr_suffix(.stderr))]
    Exited { code: Option<i32>, stderr: String },

    /// Waiting on the player failed.
    #[error("player I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl From<PlaybackError> for SpeakError {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<TransportError> for SpeakError {
    fn from(err: TransportError) -> Self {
        classify_transport_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_401_is_invalid_credential() {
        let err = classify_transport_error(TransportError::Rejected {
            status: 401,
            body: String::new(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert!(err.user_message().contains("Check the API key"));
    }

    #[test]
    fn test_auth_wording_in_body_is_invalid_credential() {
        let err = classify_transport_error(TransportError::Rejected {
            status: 400,
            body: "invalid_api_key".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[test]
    fn test_policy_close_with_auth_reason_is_invalid_credential() {
        let err = classify_transport_error(TransportError::Closed {
            code: 1008,
            reason: "Invalid API key".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[test]
    fn test_unreachable_is_network() {
        let err = classify_transport_error(TransportError::Unreachable(
            "failed to lookup address information".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::NetworkUnavailable);
        assert!(err.user_message().contains("internet connection"));
    }

    #[test]
    fn test_dns_wording_in_other_is_network() {
        let err = classify_transport_error(TransportError::Other(
            "io error: Temporary failure in name resolution".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::NetworkUnavailable);
    }

    #[test]
    fn test_everything_else_is_backend_with_raw_message() {
        let err = classify_transport_error(TransportError::Closed {
            code: 1011,
            reason: "quota exceeded".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::BackendError);
        assert!(err.user_message().contains("quota exceeded"));

        let err = classify_transport_error(TransportError::TimedOut("first audio chunk"));
        assert_eq!(err.kind(), ErrorKind::BackendError);
        assert!(err.to_string().contains("first audio chunk"));
    }

    #[test]
    fn test_backend_report_classification() {
        assert_eq!(
            SpeakError::from_backend_report("Unauthorized: bad xi-api-key").kind(),
            ErrorKind::InvalidCredential
        );
        assert_eq!(
            SpeakError::from_backend_report("voice not found").kind(),
            ErrorKind::BackendError
        );
    }

    #[test]
    fn test_playback_message_is_distinct_from_backend() {
        let err: SpeakError = PlaybackError::Exited {
            code: Some(1),
            stderr: "no audio device".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::PlaybackFailure);
        let message = err.user_message();
        assert!(message.contains("status 1: no audio device"));
        assert!(message.contains("not at fault"));
    }
}
