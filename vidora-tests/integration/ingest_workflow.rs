//! Directory ingestion feeding the stream endpoint.

use axum::http::StatusCode;
use vidora_core::storage::test_fixtures::patterned_bytes;
use vidora_core::storage::{VideoCatalog, ingest_directory};

use crate::common::{TestServer, body_bytes};

#[tokio::test]
async fn test_ingested_videos_stream() {
    let server = TestServer::new(4096).await;
    let library = server.dir.path().join("library");
    std::fs::create_dir_all(library.join("season1")).unwrap();

    let first = patterned_bytes(3000);
    let second = patterned_bytes(1200);
    std::fs::write(library.join("pilot.mp4"), &first).unwrap();
    std::fs::write(library.join("season1/episode1.mp4"), &second).unwrap();
    std::fs::write(library.join("cover.jpg"), b"jpeg").unwrap();

    let added = ingest_directory(server.catalog.as_ref(), &library)
        .await
        .unwrap();
    assert_eq!(added, 2);

    let videos = server.catalog.list().await;
    let pilot = videos.iter().find(|v| v.title == "pilot").unwrap();
    assert_eq!(pilot.description.as_deref(), Some("pilot"));

    let response = server.stream(&pilot.id, Some("bytes=2990-2999")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, first[2990..]);

    let episode = videos.iter().find(|v| v.title == "episode1").unwrap();
    let response = server.stream(&episode.id, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, second);
}
