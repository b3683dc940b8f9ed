//! Ephemeral, append-only audio buffer.
//!
//! The buffer owns a uniquely named temp file. [`AudioBuffer::release`]
//! deletes it exactly once; dropping the buffer releases it too, so every
//! exit path of the pipeline cleans up.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const BUFFER_PREFIX: &str = "readaloud-";
const BUFFER_SUFFIX: &str = ".mp3";

/// Append-only temp file holding decoded audio.
#[derive(Debug)]
pub struct AudioBuffer {
    file: Option<File>,
    temp_path: Option<TempPath>,
    path: PathBuf,
    bytes_written: u64,
}

impl AudioBuffer {
    /// Create an empty buffer in `dir`, or the system temp dir when `None`.
    pub fn create(dir: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(BUFFER_PREFIX).suffix(BUFFER_SUFFIX);
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let (file, temp_path) = named.into_parts();
        let path = temp_path.to_path_buf();
        debug!(path = %path.display(), "Audio buffer created");

        Ok(Self {
            file: Some(File::from_std(file)),
            temp_path: Some(temp_path),
            path,
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub const fn is_released(&self) -> bool {
        self.temp_path.is_none()
    }

    /// Append `chunk` and flush it, so a reader never sees less than what
    /// this call reported as written.
    pub async fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("audio buffer was already released"))?;
        file.write_all(chunk).await?;
        file.flush().await?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Close and delete the file. Later calls do nothing.
    ///
    /// A failed deletion is logged and otherwise ignored.
    pub fn release(&mut self) {
        self.file = None;
        if let Some(temp_path) = self.temp_path.take() {
            match temp_path.close() {
                Ok(()) => debug!(path = %self.path.display(), "Audio buffer deleted"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to delete audio buffer"
                ),
            }
        }
    }
}

impl Drop for AudioBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = AudioBuffer::create(Some(dir.path())).unwrap();
        buffer.append(b"ABC").await.unwrap();
        buffer.append(b"DEF").await.unwrap();

        assert_eq!(buffer.bytes_written(), 6);
        assert_eq!(std::fs::read(buffer.path()).unwrap(), b"ABCDEF");
    }

    #[tokio::test]
    async fn test_release_deletes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = AudioBuffer::create(Some(dir.path())).unwrap();
        let path = buffer.path().to_path_buf();
        assert!(path.exists());

        buffer.release();
        assert!(!path.exists());
        assert!(buffer.is_released());
        buffer.release();
    }

    #[tokio::test]
    async fn test_drop_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = AudioBuffer::create(Some(dir.path())).unwrap();
        let path = buffer.path().to_path_buf();
        drop(buffer);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_append_after_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = AudioBuffer::create(Some(dir.path())).unwrap();
        buffer.release();
        assert!(buffer.append(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_buffers_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = AudioBuffer::create(Some(dir.path())).unwrap();
        let b = AudioBuffer::create(Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());

        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("readaloud-"));
        assert!(name.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AudioBuffer::create(Some(&dir.path().join("missing"))).is_err());
    }
}
