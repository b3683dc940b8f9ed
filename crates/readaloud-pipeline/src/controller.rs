//! Supersede-on-reinvoke cancellation.
//!
//! Triggering the command again while speech is still playing cancels the
//! running invocation and starts the new one. Each invocation keeps its own
//! session and uniquely named buffer, so the two never share resources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use readaloud_core::SpeakError;

use crate::pipeline::{SpeakOutcome, SpeakRequest, SpeechPipeline};

/// Runs at most one live invocation of a [`SpeechPipeline`].
pub struct SpeechController {
    pipeline: Arc<SpeechPipeline>,
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl SpeechController {
    pub fn new(pipeline: Arc<SpeechPipeline>) -> Self {
        Self {
            pipeline,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn pipeline(&self) -> &SpeechPipeline {
        &self.pipeline
    }

    /// Cancel any running invocation, then speak `request`.
    pub async fn speak(&self, request: SpeakRequest) -> Result<SpeakOutcome, SpeakError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        if let Some((previous, previous_token)) = self.lock().replace((id, token.clone())) {
            debug!(previous, next = id, "Superseding running speech");
            previous_token.cancel();
        }

        let result = self.pipeline.speak(request, token).await;

        let mut current = self.lock();
        if current.as_ref().is_some_and(|(running, _)| *running == id) {
            *current = None;
        }
        result
    }

    /// Cancel the running invocation, if any. Returns whether one was running.
    pub fn stop(&self) -> bool {
        match self.lock().take() {
            Some((id, token)) => {
                debug!(id, "Stopping speech");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether an invocation is running.
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
