//! Local audio player.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PlaybackError;

/// Starts a player against a buffer file.
pub trait AudioPlayer: Send + Sync {
    /// Start playing the file at `path`.
    ///
    /// Callers guarantee the file holds at least one byte.
    fn start(&self, path: &Path) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// One running player.
#[async_trait]
pub trait PlaybackHandle: Send {
    /// Wait for the player to exit; `Err` on a nonzero exit or wait failure.
    ///
    /// Must be cancel-safe so it can sit in a `select!` next to the stream.
    /// Once it has returned, later calls return `Ok(())` immediately.
    async fn wait(&mut self) -> Result<(), PlaybackError>;

    /// Terminate the player if it is still running and reap it.
    async fn stop(&mut self);
}
