//! Speak command handler.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use readaloud_core::ChannelEmitter;
use readaloud_pipeline::{SpeakRequest, SpeechPipeline};

use crate::commands::PipelineOptions;
use crate::error::CliError;
use crate::presentation::spawn_renderer;

/// Speak `text`, or standard input when `text` is `None`.
///
/// Resolves once playback has finished. Ctrl-C cancels the invocation and
/// still runs cleanup before returning [`SpeakError::Cancelled`].
///
/// [`SpeakError::Cancelled`]: readaloud_core::SpeakError::Cancelled
pub async fn execute(text: Option<String>, options: &PipelineOptions) -> Result<(), CliError> {
    let text = match text {
        Some(text) => text,
        None => read_text(tokio::io::stdin()).await.map_err(CliError::Input)?,
    };
    let config = options.pipeline_config()?;

    let (emitter, events) = ChannelEmitter::new();
    let renderer = spawn_renderer(events);
    let pipeline = SpeechPipeline::standard(config, Arc::new(emitter))?;

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(cancel.clone());
    let result = pipeline
        .speak(SpeakRequest::new(text, options.preferences()), cancel)
        .await;
    interrupt.abort();

    // Dropping the pipeline closes the event channel so the renderer drains.
    drop(pipeline);
    if let Err(e) = renderer.await {
        debug!(error = %e, "Event renderer stopped abnormally");
    }

    let outcome = result?;
    debug!(chunks = outcome.chunks, bytes = outcome.bytes, "Speak command complete");
    Ok(())
}

/// Read the whole selection from `reader`.
async fn read_text<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text).await?;
    Ok(text)
}

fn cancel_on_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping speech");
            cancel.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use readaloud_core::{ConfigError, ErrorKind, SpeakError};
    use tokio_test::io::Builder;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn test_read_text_joins_partial_reads() {
        let reader = Builder::new().read(b"Hello ").read("wörld\n".as_bytes()).build();
        assert_eq!(assert_ok!(read_text(reader).await), "Hello wörld\n");
    }

    #[tokio::test]
    async fn test_read_text_surfaces_io_errors() {
        let reader = Builder::new()
            .read(b"Hel")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            .build();
        let err = assert_err!(read_text(reader).await);
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_read_text_rejects_invalid_utf8() {
        let reader = Builder::new().read(&[0x66, 0xff, 0x6f]).build();
        let err = assert_err!(read_text(reader).await);
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_blank_text_fails_before_connecting() {
        let options = PipelineOptions {
            api_key: "sk-test".to_string(),
            ..PipelineOptions::default()
        };
        let err = execute(Some(" \n\t ".to_string()), &options).await.unwrap_err();
        assert!(matches!(&err, CliError::Speak(e) if e.kind() == ErrorKind::EmptyText));
        assert_eq!(err.exit_code(), 65);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_invalid_credential() {
        let err = execute(Some("Hello".to_string()), &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Speak(SpeakError::InvalidCredential(_))));
        assert_eq!(err.exit_code(), 77);
    }

    #[tokio::test]
    async fn test_invalid_player_is_config_error() {
        let options = PipelineOptions {
            api_key: "sk-test".to_string(),
            player: Some(String::new()),
            ..PipelineOptions::default()
        };
        let err = execute(Some("Hello".to_string()), &options).await.unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::EmptyPlayerCommand)));
    }
}
