//! Byte-range video streaming endpoint.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use tracing::debug;
use vidora_core::storage::VideoCatalog;

use super::error::ApiError;
use crate::server::AppState;

/// Raw `Range` header value, if present.
///
/// Non-UTF-8 values are passed through lossily so the range parser rejects
/// them instead of silently serving the whole file.
pub fn extract_range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// `GET /stream/{id}`
///
/// Serves the whole file with 200, a single range with 206, or 416 with an
/// empty body when the range cannot be satisfied.
///
/// # Errors
///
/// - `ApiError::VideoNotFound` - Unknown id
/// - `ApiError::FileMissing` - File no longer on disk
/// - `ApiError::Internal` - File metadata could not be read
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range_header = extract_range_header(&headers);
    debug!("Stream request for {} with range {:?}", id, range_header);

    let resolved = state.catalog.resolve(&id).await?;
    let descriptor = state
        .assembler
        .assemble(resolved.into_stream_request(range_header));

    Ok(descriptor.into_response())
}
