//! Progress emitter trait for host notifications.
//!
//! Implementations handle transport details (stdout, channels, a plugin
//! host's toast API). Emitting never blocks and never fails the pipeline.

use tokio::sync::mpsc;

use crate::events::PipelineEvent;

/// Trait for emitting pipeline notifications.
pub trait ProgressEmitter: Send + Sync {
    /// Emit one event.
    fn emit(&self, event: PipelineEvent);
}

/// A no-op emitter for contexts without a listener.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl ProgressEmitter for NoopEmitter {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver that consumes its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressEmitter for ChannelEmitter {
    fn emit(&self, event: PipelineEvent) {
        // Best-effort - if the receiver is dropped, we log and move on.
        if self.tx.send(event).is_err() {
            tracing::warn!("Pipeline event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn ProgressEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(PipelineEvent::Checking);
    }

    #[test]
    fn test_channel_emitter_delivers_in_order() {
        let (emitter, mut rx) = ChannelEmitter::new();
        emitter.emit(PipelineEvent::Checking);
        emitter.emit(PipelineEvent::Processing { words: 3 });

        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Checking);
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Processing { words: 3 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_emitter_survives_dropped_receiver() {
        let (emitter, rx) = ChannelEmitter::new();
        drop(rx);
        emitter.emit(PipelineEvent::Cancelled);
    }
}
