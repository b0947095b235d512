//! Test fixtures for storage testing.
//!
//! Provides on-disk video files with known contents and catalogs that point
//! at them, so streaming tests can compare response bodies byte for byte.

use std::path::PathBuf;

use chrono::Utc;

use super::catalog::{InMemoryCatalog, VideoCatalog, VideoMetadata};

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Writes a patterned video file into a fresh temporary directory.
///
/// # Panics
///
/// Panics if the temporary directory or file cannot be created.
/// This is acceptable in test fixtures where failures indicate environment issues.
pub fn create_video_file(len: usize) -> (tempfile::TempDir, PathBuf, Vec<u8>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("fixture.mp4");
    let data = patterned_bytes(len);
    std::fs::write(&path, &data).unwrap();
    (temp_dir, path, data)
}

/// Catalog entry for a fixture file.
pub fn metadata_for_file(id: &str, path: PathBuf, size: u64) -> VideoMetadata {
    VideoMetadata {
        id: id.to_string(),
        title: format!("Fixture {id}"),
        description: None,
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        filepath: path,
        size,
        uploaded_at: Utc::now(),
    }
}

/// Catalog holding a single patterned video registered under `id`.
///
/// # Panics
///
/// Panics if the fixture file cannot be written.
pub async fn catalog_with_video(
    id: &str,
    len: usize,
) -> (tempfile::TempDir, InMemoryCatalog, Vec<u8>) {
    let (temp_dir, path, data) = create_video_file(len);
    let catalog = InMemoryCatalog::new();
    catalog
        .insert(metadata_for_file(id, path, len as u64))
        .await;
    (temp_dir, catalog, data)
}
