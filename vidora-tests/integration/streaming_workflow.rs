//! End-to-end tests for upload and playback over the HTTP API
//!
//! Upload a video, find it in the catalog listing, then play it back the
//! way a browser does: an initial open-ended request followed by seeks.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use futures::future::join_all;
use vidora_core::storage::VideoCatalog;
use vidora_core::storage::test_fixtures::patterned_bytes;

use crate::common::{TestServer, body_bytes, json_body, upload_request};

#[tokio::test]
async fn test_upload_list_and_play() {
    let server = TestServer::new(4096).await;
    let data = patterned_bytes(20_000);
    let id = server.upload("Trailer", &data).await;

    let response = server
        .send(Request::get("/videos/").body(Body::empty()).unwrap())
        .await;
    let listing = json_body(response).await;
    let entries = listing.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["title"], "Trailer");
    assert_eq!(entries[0]["size"], 20_000);

    let response = server.stream(&id, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "20000");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_browser_style_seeking() {
    let server = TestServer::new(1000).await;
    let data = patterned_bytes(10_000);
    let id = server.upload("Seek test", &data).await;

    let response = server.stream(&id, Some("bytes=0-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-9999/10000");
    assert_eq!(body_bytes(response).await, data);

    for (start, end) in [(5000, 5999), (9000, 9999), (1234, 4321)] {
        let response = server
            .stream(&id, Some(&format!("bytes={start}-{end}")))
            .await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            format!("bytes {start}-{end}/10000").as_str()
        );
        assert_eq!(body_bytes(response).await, data[start..=end]);
    }
}

#[tokio::test]
async fn test_body_frames_respect_chunk_size() {
    let server = TestServer::new(256).await;
    let data = patterned_bytes(1000);
    let id = server.upload("Chunks", &data).await;

    let response = server.stream(&id, Some("bytes=10-809")).await;
    let frames: Vec<_> = response
        .into_body()
        .into_data_stream()
        .map(|frame| frame.unwrap())
        .collect()
        .await;

    let sizes: Vec<usize> = frames.iter().map(|f| f.len()).collect();
    assert_eq!(sizes, vec![256, 256, 256, 32]);
    let joined: Vec<u8> = frames.iter().flat_map(|f| f.iter().copied()).collect();
    assert_eq!(joined, data[10..810]);
}

#[tokio::test]
async fn test_unsatisfiable_range_over_http() {
    let server = TestServer::new(4096).await;
    let id = server.upload("Short", &patterned_bytes(1000)).await;

    let response = server.stream(&id, Some("bytes=1000-1000")).await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_concurrent_streams_are_independent() {
    let server = TestServer::new(512).await;
    let data = patterned_bytes(8192);
    let id = server.upload("Shared", &data).await;

    let ranges: Vec<(usize, usize)> = (0..16).map(|i| (i * 500, i * 500 + 299)).collect();
    let responses = join_all(ranges.iter().map(|(start, end)| {
        let header_value = format!("bytes={start}-{end}");
        let server = &server;
        let id = id.as_str();
        async move { body_bytes(server.stream(id, Some(&header_value)).await).await }
    }))
    .await;

    for ((start, end), body) in ranges.iter().zip(responses) {
        assert_eq!(body, data[*start..=*end]);
    }
}

#[tokio::test]
async fn test_deleted_file_returns_not_found() {
    let server = TestServer::new(4096).await;
    let id = server.upload("Doomed", &patterned_bytes(100)).await;

    let metadata = server.catalog.get(&id).await.unwrap();
    std::fs::remove_file(&metadata.filepath).unwrap();

    let response = server.stream(&id, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await["detail"],
        "Video file not found on server"
    );
}

#[tokio::test]
async fn test_rejected_upload_leaves_no_file() {
    let server = TestServer::new(4096).await;

    let response = server
        .send(upload_request("Doc", "notes.pdf", "application/pdf", b"%PDF"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.catalog.is_empty());
    let files = std::fs::read_dir(&server.config.storage.video_dir)
        .unwrap()
        .count();
    assert_eq!(files, 0);
}
