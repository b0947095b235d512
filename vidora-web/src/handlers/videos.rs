//! Upload and catalog endpoints.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use vidora_core::storage::{PendingUpload, VideoCatalog, VideoMetadata, VideoStore};

use super::error::ApiError;
use crate::server::AppState;

/// Body returned after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Id assigned to the new video
    pub id: String,
    /// Title given in the form
    pub title: String,
    /// Description given in the form, if any
    pub description: Option<String>,
}

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Vidora" }))
}

/// `POST /upload/`
///
/// Accepts `title`, optional `description` and a `file` whose content type
/// starts with `video/`. The file is streamed to disk as it arrives.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Missing field or non-video content type
/// - `ApiError::Multipart` - Malformed or oversized multipart body
/// - `ApiError::Internal` - File could not be stored
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut upload = None;
    let form = read_upload_form(&state.store, multipart, &mut upload).await;

    let (title, description, upload) = match (form, upload) {
        (Ok(UploadForm {
            title: Some(title),
            description,
        }), Some(upload)) => (title, description, upload),
        (form, upload) => {
            if let Some(upload) = upload {
                upload.abort().await;
            }
            return Err(match form {
                Err(e) => e,
                Ok(UploadForm { title: None, .. }) => ApiError::missing_field("title"),
                Ok(_) => ApiError::missing_field("file"),
            });
        }
    };

    let stored = upload.finish().await?;
    let id = stored.id.to_string();
    state
        .catalog
        .insert(VideoMetadata {
            id: id.clone(),
            title: title.clone(),
            description: description.clone(),
            filename: stored.filename.clone(),
            filepath: stored.path,
            size: stored.size,
            uploaded_at: Utc::now(),
        })
        .await;

    info!(
        "Uploaded video: {} (ID: {}, Filename: {})",
        title, id, stored.filename
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id,
            title,
            description,
        }),
    ))
}

/// Text fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
}

/// Reads the form, streaming the first `file` part into `upload`.
///
/// `upload` is filled as soon as the destination file exists, so the caller
/// can remove it whatever this returns.
async fn read_upload_form(
    store: &VideoStore,
    mut multipart: Multipart,
    upload: &mut Option<PendingUpload>,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "file" if upload.is_none() => {
                let content_type = field.content_type().unwrap_or_default();
                if !content_type.starts_with("video/") {
                    return Err(ApiError::BadRequest(
                        "Invalid file type. Only video files are allowed.".to_string(),
                    ));
                }

                let original_name = field.file_name().unwrap_or("untitled").to_string();
                let pending = upload.insert(store.create_upload(&original_name).await?);
                while let Some(bytes) = field.chunk().await? {
                    pending.write_chunk(&bytes).await?;
                }
            }
            other => debug!("Ignoring form field {:?}", other),
        }
    }

    Ok(form)
}

/// `GET /videos/`
pub async fn list_videos(State(state): State<AppState>) -> Json<Vec<VideoMetadata>> {
    Json(state.catalog.list().await)
}

/// `GET /videos/{id}`
///
/// # Errors
///
/// - `ApiError::VideoNotFound` - Unknown id
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VideoMetadata>, ApiError> {
    state
        .catalog
        .get(&id)
        .await
        .map(Json)
        .ok_or(ApiError::VideoNotFound)
}
