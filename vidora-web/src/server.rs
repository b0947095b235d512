//! HTTP server for Vidora
//!
//! Wires the catalog, upload store and streaming assembler into an axum
//! router with CORS and an upload body limit.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};
use vidora_core::config::VidoraConfig;
use vidora_core::storage::{VideoCatalog, VideoStore};
use vidora_core::streaming::ResponseAssembler;

use crate::handlers::{get_video, list_videos, root, stream_video, upload_video};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Video metadata and file resolution
    pub catalog: Arc<dyn VideoCatalog>,
    /// Destination for uploads
    pub store: VideoStore,
    /// Builds streaming responses
    pub assembler: ResponseAssembler,
}

impl AppState {
    /// Creates state from configuration around an existing catalog.
    pub fn from_config(catalog: Arc<dyn VideoCatalog>, config: &VidoraConfig) -> Self {
        Self {
            catalog,
            store: VideoStore::new(config.storage.video_dir.clone()),
            assembler: ResponseAssembler::from_config(&config.streaming),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState, config: &VidoraConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upload/", post(upload_video))
        .route("/videos/", get(list_videos))
        .route("/videos/{id}", get(get_video))
        .route("/stream/{id}", get(stream_video))
        .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes))
        .layer(cors_layer(&config.server.cors_origins))
        .with_state(state)
}

/// CORS for the configured origins with credentials allowed.
///
/// Methods and headers mirror the request, since wildcards cannot be
/// combined with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Creates the video directory, binds and serves until the process stops.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - Video directory could not be created, bind failed, or the server stopped with an error
pub async fn run_server(
    config: VidoraConfig,
    catalog: Arc<dyn VideoCatalog>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(catalog, &config);
    state.store.ensure_root().await?;

    let app = build_router(state, &config);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(address.as_str()).await?;

    info!(
        "Vidora server running on http://{} (videos in {})",
        address,
        config.storage.video_dir.display()
    );
    axum::serve(listener, app).await?;
    Ok(())
}
