//! Video catalog and file resolution.
//!
//! The catalog maps opaque video ids to metadata and resolves an id into the
//! `(path, name, size)` triple the streaming engine consumes.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::streaming::StreamRequest;

/// Catalog entry for one stored video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Opaque identifier used in URLs
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Name of the file inside the video directory
    pub filename: String,
    /// Full path of the stored file
    pub filepath: PathBuf,
    /// Size in bytes when the entry was created
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A catalog entry resolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Current size on disk
    pub total_size: u64,
}

impl ResolvedFile {
    /// Pairs the resolved file with the client's `Range` header.
    pub fn into_stream_request(self, range_header: Option<String>) -> StreamRequest {
        StreamRequest {
            file_path: self.path,
            file_name: self.file_name,
            total_size: self.total_size,
            range_header,
        }
    }
}

/// Errors raised while resolving a video id.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No catalog entry for this id.
    #[error("Video not found: {id}")]
    VideoNotFound { id: String },

    /// Entry exists but its file is gone.
    #[error("Video file not found on server: {path}")]
    FileMissing { id: String, path: PathBuf },

    /// File metadata could not be read.
    #[error("Error accessing file stats for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Whether the error means the video does not exist, as opposed to a server fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::VideoNotFound { .. } | CatalogError::FileMissing { .. }
        )
    }
}

/// Storage-agnostic catalog of videos.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Adds or replaces an entry.
    async fn insert(&self, metadata: VideoMetadata);

    /// Looks up one entry.
    async fn get(&self, id: &str) -> Option<VideoMetadata>;

    /// All entries, oldest first.
    async fn list(&self) -> Vec<VideoMetadata>;

    /// Resolves an id into a streamable file.
    ///
    /// # Errors
    ///
    /// - `CatalogError::VideoNotFound` - Unknown id
    /// - `CatalogError::FileMissing` - Entry exists but the file is not a regular file on disk
    /// - `CatalogError::Io` - File metadata could not be read
    async fn resolve(&self, id: &str) -> Result<ResolvedFile, CatalogError> {
        let metadata = self
            .get(id)
            .await
            .ok_or_else(|| CatalogError::VideoNotFound { id: id.to_string() })?;
        resolve_on_disk(&metadata).await
    }
}

/// Checks that an entry's file exists and reads its current size.
///
/// # Errors
///
/// - `CatalogError::FileMissing` - Path is absent or not a regular file
/// - `CatalogError::Io` - Metadata lookup failed for another reason
pub async fn resolve_on_disk(metadata: &VideoMetadata) -> Result<ResolvedFile, CatalogError> {
    let missing = || CatalogError::FileMissing {
        id: metadata.id.clone(),
        path: metadata.filepath.clone(),
    };

    let stat = match tokio::fs::metadata(&metadata.filepath).await {
        Ok(stat) => stat,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Catalog entry {} points at missing file", metadata.id);
            return Err(missing());
        }
        Err(source) => {
            return Err(CatalogError::Io {
                path: metadata.filepath.clone(),
                source,
            });
        }
    };

    if !stat.is_file() {
        return Err(missing());
    }

    debug!(
        "Resolved {} to {} ({} bytes)",
        metadata.id,
        metadata.filepath.display(),
        stat.len()
    );

    Ok(ResolvedFile {
        path: metadata.filepath.clone(),
        file_name: metadata.filename.clone(),
        total_size: stat.len(),
    })
}

/// Process-local catalog. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    videos: RwLock<HashMap<String, VideoMetadata>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.videos.read().len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.videos.read().is_empty()
    }
}

#[async_trait]
impl VideoCatalog for InMemoryCatalog {
    async fn insert(&self, metadata: VideoMetadata) {
        debug!("Added metadata for video {}: {}", metadata.id, metadata.title);
        self.videos.write().insert(metadata.id.clone(), metadata);
    }

    async fn get(&self, id: &str) -> Option<VideoMetadata> {
        self.videos.read().get(id).cloned()
    }

    async fn list(&self) -> Vec<VideoMetadata> {
        let mut videos: Vec<VideoMetadata> = self.videos.read().values().cloned().collect();
        videos.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.title.cmp(&b.title))
        });
        videos
    }
}
