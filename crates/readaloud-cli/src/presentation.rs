//! Rendering of pipeline notifications on the terminal.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use readaloud_core::PipelineEvent;

/// One-line rendering of an event.
pub fn render_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Checking => "Checking selection...".to_string(),
        PipelineEvent::Processing { words } => {
            let noun = if *words == 1 { "word" } else { "words" };
            format!("Processing {words} {noun}...")
        }
        PipelineEvent::Speaking { preview } => format!("Speaking: \"{preview}\""),
        PipelineEvent::Succeeded { preview } => format!("✓ Finished: \"{preview}\""),
        PipelineEvent::Failed { message, .. } => format!("✗ {message}"),
        PipelineEvent::Cancelled => "Stopped.".to_string(),
    }
}

/// Print events to stderr until the sender side is dropped.
pub fn spawn_renderer(mut events: mpsc::UnboundedReceiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("{}", render_event(&event));
        }
    })
}

#[cfg(test)]
mod tests {
    use readaloud_core::{ErrorKind, SpeakError};

    use super::*;

    #[test]
    fn test_render_processing() {
        assert_eq!(
            render_event(&PipelineEvent::Processing { words: 2 }),
            "Processing 2 words..."
        );
        assert_eq!(
            render_event(&PipelineEvent::Processing { words: 1 }),
            "Processing 1 word..."
        );
    }

    #[test]
    fn test_render_failure_uses_classified_message() {
        let event = PipelineEvent::from_error(&SpeakError::NetworkUnavailable("dns".into()));
        assert!(matches!(
            event,
            PipelineEvent::Failed {
                kind: ErrorKind::NetworkUnavailable,
                ..
            }
        ));
        assert!(render_event(&event).contains("Check your internet connection"));
    }
}
