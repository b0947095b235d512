//! Bulk ingestion of existing video files into the catalog.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::catalog::{VideoCatalog, VideoMetadata};
use super::video_store::StoreError;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".Trash",
    ".Trashes",
    ".Spotlight-V100",
    ".fseventsd",
    "$RECYCLE.BIN",
];

/// Scans `dir` recursively for `.mp4` files and builds catalog entries for them.
///
/// Titles come from the file stem; the description defaults to the title.
/// Entries are returned sorted by path so repeated scans list files in the same order.
///
/// # Errors
///
/// - `StoreError::Io` - `dir` could not be read. Unreadable subdirectories are skipped with a warning.
pub async fn scan_video_directory(dir: &Path) -> Result<Vec<VideoMetadata>, StoreError> {
    let mut found = Vec::new();
    scan_recursive(dir, &mut found, true).await?;
    found.sort_by(|a, b| a.filepath.cmp(&b.filepath));
    Ok(found)
}

/// Scans `dir` and inserts every found video into `catalog`.
///
/// Returns the number of videos added.
///
/// # Errors
///
/// - `StoreError::Io` - `dir` could not be read
pub async fn ingest_directory(
    catalog: &dyn VideoCatalog,
    dir: &Path,
) -> Result<usize, StoreError> {
    let videos = scan_video_directory(dir).await?;
    let count = videos.len();
    for video in videos {
        catalog.insert(video).await;
    }
    Ok(count)
}

fn scan_recursive<'a>(
    dir: &'a Path,
    found: &'a mut Vec<VideoMetadata>,
    is_root: bool,
) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
    Box::pin(async move {
        let io_error = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };

            if file_type.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str())
                    && SKIPPED_DIRS.contains(&name)
                {
                    continue;
                }
                if let Err(e) = scan_recursive(&path, found, false).await {
                    warn!("Failed to scan {}: {}", path.display(), e);
                }
            } else if file_type.is_file()
                && is_mp4(&path)
                && let Ok(metadata) = entry.metadata().await
            {
                found.push(metadata_for(path, metadata.len()));
            }
        }

        if is_root {
            debug!("Scanned {}: {} videos", dir.display(), found.len());
        }
        Ok(())
    })
}

fn is_mp4(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
}

fn metadata_for(path: PathBuf, size: u64) -> VideoMetadata {
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    VideoMetadata {
        id: Uuid::new_v4().to_string(),
        description: Some(title.clone()),
        title,
        filename,
        filepath: path,
        size,
        uploaded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::storage::InMemoryCatalog;

    async fn write(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, vec![0u8; len]).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_finds_mp4_files_recursively() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("video1.mp4"), 10).await;
        write(&dir.path().join("nested/video2.MP4"), 20).await;
        write(&dir.path().join("notes.txt"), 5).await;
        write(&dir.path().join("clip.mkv"), 5).await;
        write(&dir.path().join(".Trash/deleted.mp4"), 5).await;
        write(&dir.path().join(".git/lfs/objects/clip.mp4"), 5).await;
        write(&dir.path().join("$RECYCLE.BIN/old.mp4"), 5).await;

        let videos = scan_video_directory(dir.path()).await.unwrap();

        // Sorted by path: "nested/..." sorts before "video1.mp4".
        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["video2", "video1"]);
        assert_eq!(videos.len(), 2);
        assert!(videos.iter().any(|v| v.title == "video1" && v.size == 10));
        assert!(videos.iter().any(|v| v.title == "video2" && v.size == 20));
        assert!(
            videos
                .iter()
                .all(|v| v.description.as_deref() == Some(v.title.as_str()))
        );
    }

    #[tokio::test]
    async fn test_ingest_populates_catalog() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a.mp4"), 3).await;
        write(&dir.path().join("b.mp4"), 4).await;

        let catalog = InMemoryCatalog::new();
        let added = ingest_directory(&catalog, dir.path()).await.unwrap();

        assert_eq!(added, 2);
        assert_eq!(catalog.len(), 2);
        let first = catalog.list().await.remove(0);
        assert_eq!(catalog.resolve(&first.id).await.unwrap().total_size, first.size);
    }

    #[tokio::test]
    async fn test_scan_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = scan_video_directory(&dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
