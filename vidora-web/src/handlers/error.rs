//! Error responses rendered as `{"detail": "..."}`.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use vidora_core::{CatalogError, StoreError};

/// Failure of an API request, mapped to a status code and a detail message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client sent an unusable request.
    #[error("{0}")]
    BadRequest(String),

    /// No catalog entry for the requested id.
    #[error("Video not found")]
    VideoNotFound,

    /// Catalog entry exists but the file is gone.
    #[error("Video file not found on server")]
    FileMissing,

    /// Multipart body could not be read.
    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    /// Server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::VideoNotFound | ApiError::FileMissing => StatusCode::NOT_FOUND,
            ApiError::Multipart(e) => e.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Missing required form field.
    pub fn missing_field(name: &str) -> Self {
        ApiError::BadRequest(format!("Missing form field: {name}"))
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::VideoNotFound { .. } => ApiError::VideoNotFound,
            CatalogError::FileMissing { .. } => ApiError::FileMissing,
            CatalogError::Io { path, source } => {
                error!("Failed to stat {}: {}", path.display(), source);
                ApiError::Internal(format!("Error accessing file stats: {source}"))
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        error!("Upload storage failed: {}", error);
        match error {
            StoreError::Io { source, .. } => {
                ApiError::Internal(format!("Could not save file: {source}"))
            }
            StoreError::Closed { .. } => ApiError::Internal("Could not save file".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::to_bytes;

    use super::*;

    async fn detail(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_detail() {
        let (status, json) = detail(ApiError::VideoNotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, json!({ "detail": "Video not found" }));
    }

    #[tokio::test]
    async fn test_catalog_error_mapping() {
        let missing = ApiError::from(CatalogError::FileMissing {
            id: "a".to_string(),
            path: PathBuf::from("/gone.mp4"),
        });
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Video file not found on server");

        let io = ApiError::from(CatalogError::Io {
            path: PathBuf::from("/locked.mp4"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(io.to_string().starts_with("Error accessing file stats"));
    }

    #[tokio::test]
    async fn test_bad_request_detail() {
        let (status, json) = detail(ApiError::missing_field("title")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], "Missing form field: title");
    }
}
