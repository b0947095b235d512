//! Shared helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use axum::response::Response;
use tempfile::TempDir;
use tower::ServiceExt;
use vidora_core::VidoraConfig;
use vidora_core::storage::InMemoryCatalog;
use vidora_web::{AppState, build_router};

const BOUNDARY: &str = "vidora-integration";

/// Router over a fresh catalog and a temporary video directory.
pub struct TestServer {
    pub dir: TempDir,
    pub router: Router,
    pub catalog: Arc<InMemoryCatalog>,
    pub config: VidoraConfig,
}

impl TestServer {
    pub async fn new(chunk_size: u32) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = VidoraConfig::for_testing(dir.path().join("videos"));
        config.streaming.chunk_size = chunk_size;

        let catalog = Arc::new(InMemoryCatalog::new());
        let state = AppState::from_config(catalog.clone(), &config);
        state.store.ensure_root().await.unwrap();

        Self {
            router: build_router(state, &config),
            dir,
            catalog,
            config,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn stream(&self, id: &str, range: Option<&str>) -> Response {
        let mut request = Request::get(format!("/stream/{id}"));
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    /// Uploads `data` as a video and returns the assigned id.
    pub async fn upload(&self, title: &str, data: &[u8]) -> String {
        let response = self.send(upload_request(title, "clip.mp4", "video/mp4", data)).await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let json = json_body(response).await;
        json["id"].as_str().unwrap().to_string()
    }
}

pub fn upload_request(title: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
