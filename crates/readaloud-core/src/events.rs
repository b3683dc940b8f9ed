//! Progress and terminal notifications emitted to the host.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so a host UI can switch on it:
//!
//! ```json
//! { "type": "processing", "words": 2 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SpeakError};

/// Notifications for one speak invocation.
///
/// Every invocation emits zero or more informational events followed by
/// exactly one terminal event ([`Succeeded`](Self::Succeeded),
/// [`Failed`](Self::Failed), or [`Cancelled`](Self::Cancelled)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Validating the selection and preferences.
    Checking,

    /// Text accepted; synthesis is being requested.
    Processing {
        /// Whitespace-separated word count of the text.
        words: usize,
    },

    /// The player has started.
    Speaking {
        /// Truncated rendering of the text.
        preview: String,
    },

    /// Playback completed.
    Succeeded { preview: String },

    /// The invocation failed.
    Failed {
        kind: ErrorKind,
        /// Classified, user-facing message.
        message: String,
    },

    /// The invocation was cancelled or superseded.
    Cancelled,
}

impl PipelineEvent {
    /// Build the terminal event for a failed invocation.
    pub fn from_error(err: &SpeakError) -> Self {
        match err {
            SpeakError::Cancelled => Self::Cancelled,
            other => Self::Failed {
                kind: other.kind(),
                message: other.user_message(),
            },
        }
    }

    /// Whether this event ends the invocation.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_tagged() {
        let json = serde_json::to_string(&PipelineEvent::Processing { words: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"processing","words":2}"#);

        let json = serde_json::to_string(&PipelineEvent::Failed {
            kind: ErrorKind::InvalidCredential,
            message: "bad key".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"failed","kind":"invalid_credential","message":"bad key"}"#
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!PipelineEvent::Checking.is_terminal());
        assert!(!PipelineEvent::Processing { words: 1 }.is_terminal());
        assert!(
            !PipelineEvent::Speaking {
                preview: String::new()
            }
            .is_terminal()
        );
        assert!(PipelineEvent::Cancelled.is_terminal());
        assert!(
            PipelineEvent::Succeeded {
                preview: String::new()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_from_error_maps_cancellation() {
        assert_eq!(
            PipelineEvent::from_error(&SpeakError::Cancelled),
            PipelineEvent::Cancelled
        );
        let event = PipelineEvent::from_error(&SpeakError::Backend("boom".to_string()));
        assert!(matches!(
            event,
            PipelineEvent::Failed {
                kind: ErrorKind::BackendError,
                ..
            }
        ));
    }
}
