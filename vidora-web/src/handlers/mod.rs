//! HTTP request handlers organized by functionality

pub mod error;
pub mod streaming;
pub mod videos;

// Re-export handler functions
pub use error::ApiError;
pub use streaming::{extract_range_header, stream_video};
pub use videos::{UploadResponse, get_video, list_videos, root, upload_video};
