//! On-disk storage for uploaded videos.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors raised while writing videos to disk.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system operation failed.
    #[error("Could not save file {path}: {source}")]
    Io {
        /// Path being written or created.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Upload was used after it had been finished or aborted.
    #[error("Upload {path} is already closed")]
    Closed {
        /// Path of the closed upload.
        path: PathBuf,
    },
}

/// A video fully written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVideo {
    pub id: Uuid,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Directory that holds uploaded video files.
#[derive(Debug, Clone)]
pub struct VideoStore {
    root: PathBuf,
}

impl VideoStore {
    /// Creates a store rooted at `root`. The directory is created by [`ensure_root`](Self::ensure_root).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the storage directory if it does not exist.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - Directory could not be created
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })
    }

    /// Starts a new upload named `<uuid>_<original name>`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - Destination file could not be created
    pub async fn create_upload(&self, original_name: &str) -> Result<PendingUpload, StoreError> {
        let id = Uuid::new_v4();
        let filename = format!("{id}_{}", sanitize_filename(original_name));
        let path = self.root.join(&filename);

        let file = File::create(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Started upload {} at {}", id, path.display());

        Ok(PendingUpload {
            id,
            filename,
            path,
            file: Some(file),
            written: 0,
        })
    }
}

/// An upload in progress.
///
/// Async callers end it with [`finish`](Self::finish) or [`abort`](Self::abort).
/// Dropping it unfinished still removes the partial file, but through a
/// blocking `std::fs` call; that path is a last resort for unwinding and
/// cancelled tasks.
#[derive(Debug)]
pub struct PendingUpload {
    id: Uuid,
    filename: String,
    path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl PendingUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends bytes to the upload.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - Write failed
    /// - `StoreError::Closed` - Upload already finished or aborted
    pub async fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let file = self.file.as_mut().ok_or_else(|| StoreError::Closed {
            path: self.path.clone(),
        })?;
        file.write_all(bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flushes the file and hands back the stored video.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - Flush failed; the partial file is removed
    /// - `StoreError::Closed` - Upload already finished or aborted
    pub async fn finish(mut self) -> Result<StoredVideo, StoreError> {
        let mut file = self.file.take().ok_or_else(|| StoreError::Closed {
            path: self.path.clone(),
        })?;

        if let Err(source) = file.flush().await {
            drop(file);
            remove_partial(&self.path).await;
            return Err(StoreError::Io {
                path: std::mem::take(&mut self.path),
                source,
            });
        }
        drop(file);

        info!(
            "Stored upload {} ({} bytes) at {}",
            self.id,
            self.written,
            self.path.display()
        );

        Ok(StoredVideo {
            id: self.id,
            filename: std::mem::take(&mut self.filename),
            path: std::mem::take(&mut self.path),
            size: self.written,
        })
    }

    /// Discards the upload and removes the partial file.
    pub async fn abort(mut self) {
        drop(self.file.take());
        remove_partial(&self.path).await;
        self.path = PathBuf::new();
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        // A taken file with an emptied path means finish/abort already ran.
        if self.path.as_os_str().is_empty() {
            return;
        }
        if self.file.take().is_some() {
            warn!("Discarding unfinished upload {}", self.path.display());
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial upload {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial upload {}: {}", path.display(), e),
    }
}

/// Reduces a client-supplied file name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("movie.mp4"), "movie.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\videos\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("bad\nname.mp4"), "bad_name.mp4");
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename(".."), "untitled");
        assert_eq!(sanitize_filename("dir/"), "untitled");
    }

    #[tokio::test]
    async fn test_upload_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = VideoStore::new(dir.path().join("videos"));
        store.ensure_root().await.unwrap();

        let mut upload = store.create_upload("holiday.mp4").await.unwrap();
        upload.write_chunk(b"hello ").await.unwrap();
        upload.write_chunk(b"world").await.unwrap();
        assert_eq!(upload.written(), 11);

        let stored = upload.finish().await.unwrap();
        assert!(stored.filename.ends_with("_holiday.mp4"));
        assert!(stored.filename.starts_with(&stored.id.to_string()));
        assert_eq!(stored.size, 11);
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_abort_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = VideoStore::new(dir.path());

        let mut upload = store.create_upload("clip.mp4").await.unwrap();
        upload.write_chunk(b"partial").await.unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());

        upload.abort().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = VideoStore::new(dir.path());

        let upload = store.create_upload("clip.mp4").await.unwrap();
        let path = upload.path().to_path_buf();
        drop(upload);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_create_upload_without_root_fails() {
        let dir = TempDir::new().unwrap();
        let store = VideoStore::new(dir.path().join("missing"));

        let err = store.create_upload("clip.mp4").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
