//! CLI error type and exit code mapping.

use thiserror::Error;

use readaloud_core::{ConfigError, ErrorKind, SpeakError};

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The speak invocation failed.
    #[error("{}", .0.user_message())]
    Speak(#[from] SpeakError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading the input text failed.
    #[error("Failed to read text from standard input: {0}")]
    Input(#[source] std::io::Error),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where a category fits; cancellation
    /// uses the shell convention for SIGINT.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Speak(err) => exit_code_for_kind(err.kind()),
            Self::Config(_) => 78, // EX_CONFIG
            Self::Input(_) => 66,  // EX_NOINPUT
        }
    }
}

/// Exit code for a classified pipeline failure.
pub const fn exit_code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::EmptyText => 65,         // EX_DATAERR
        ErrorKind::NetworkUnavailable => 69, // EX_UNAVAILABLE
        ErrorKind::PlaybackFailure => 71,   // EX_OSERR
        ErrorKind::Storage => 74,           // EX_IOERR
        ErrorKind::BackendError | ErrorKind::ProtocolError => 76, // EX_PROTOCOL
        ErrorKind::InvalidCredential => 77, // EX_NOPERM
        ErrorKind::Cancelled => 130,
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}

/// Speak failures were already rendered as a terminal notification.
pub fn already_reported(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CliError>(), Some(CliError::Speak(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_errors_map_by_kind() {
        let cases = [
            (SpeakError::InvalidCredential("401".into()), 77),
            (SpeakError::NetworkUnavailable("dns".into()), 69),
            (SpeakError::Backend("boom".into()), 76),
            (SpeakError::Protocol("bad json".into()), 76),
            (SpeakError::Playback("exit 1".into()), 71),
            (SpeakError::EmptyText, 65),
            (SpeakError::Cancelled, 130),
        ];
        for (err, code) in cases {
            assert_eq!(CliError::from(err).exit_code(), code);
        }
    }

    #[test]
    fn test_display_uses_user_message() {
        let err = CliError::from(SpeakError::InvalidCredential("HTTP 401".into()));
        assert!(err.to_string().contains("Check the API key"));
    }

    #[test]
    fn test_anyhow_downcast() {
        let err = anyhow::Error::from(CliError::Config(ConfigError::EmptyModelId));
        assert_eq!(exit_code(&err), 78);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
        assert!(!already_reported(&err));
        assert!(already_reported(&CliError::from(SpeakError::Cancelled).into()));
    }
}
