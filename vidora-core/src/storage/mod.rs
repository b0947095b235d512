//! Storage layer for uploaded videos.
//!
//! Holds the video catalog (id to metadata, id to streamable file), the
//! on-disk upload store, and bulk ingestion of existing directories.

pub mod catalog;
pub mod ingest;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
pub mod video_store;

pub use catalog::{
    CatalogError, InMemoryCatalog, ResolvedFile, VideoCatalog, VideoMetadata, resolve_on_disk,
};
pub use ingest::{ingest_directory, scan_video_directory};
pub use video_store::{PendingUpload, StoreError, StoredVideo, VideoStore, sanitize_filename};
