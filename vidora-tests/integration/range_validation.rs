//! Integration tests for range handling on real files
//!
//! Drives the response assembler directly against files on disk and checks
//! status, headers and body for the standard range scenarios.

use axum::body::to_bytes;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use proptest::prelude::*;
use vidora_core::storage::test_fixtures::create_video_file;
use vidora_core::streaming::{ResponseAssembler, StreamRequest, StreamStatus};

fn request(path: &std::path::Path, total_size: u64, range: Option<&str>) -> StreamRequest {
    StreamRequest {
        file_path: path.to_path_buf(),
        file_name: "fixture.mp4".to_string(),
        total_size,
        range_header: range.map(str::to_string),
    }
}

async fn run(
    assembler: &ResponseAssembler,
    request: StreamRequest,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = assembler.assemble(request).into_response();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_middle_range_of_thousand_byte_file() {
    let (_dir, path, data) = create_video_file(1000);
    let assembler = ResponseAssembler::new(64);

    let (status, headers, body) = run(&assembler, request(&path, 1000, Some("bytes=100-199"))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_LENGTH], "100");
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body, data[100..200]);
}

#[tokio::test]
async fn test_last_byte() {
    let (_dir, path, data) = create_video_file(1000);
    let assembler = ResponseAssembler::default();

    let (status, headers, body) = run(&assembler, request(&path, 1000, Some("bytes=999-999"))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_LENGTH], "1");
    assert_eq!(body, vec![data[999]]);
}

#[tokio::test]
async fn test_range_past_end_is_rejected() {
    let (_dir, path, _data) = create_video_file(1000);
    let assembler = ResponseAssembler::default();

    let descriptor = assembler.assemble(request(&path, 1000, Some("bytes=1000-1000")));
    assert_eq!(descriptor.status, StreamStatus::RangeNotSatisfiable);
    assert!(descriptor.body.is_none());
    assert!(
        descriptor
            .message
            .as_deref()
            .unwrap()
            .starts_with("Invalid range requested: bytes=1000-1000")
    );

    let (status, headers, body) = run(&assembler, request(&path, 1000, Some("bytes=1000-1000"))).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes */1000");
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_no_header_serves_whole_file() {
    let (_dir, path, data) = create_video_file(1000);
    let assembler = ResponseAssembler::new(128);

    let (status, headers, body) = run(&assembler, request(&path, 1000, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_LENGTH], "1000");
    assert!(headers.get(header::CONTENT_RANGE).is_none());
    assert_eq!(body, data);
}

#[tokio::test]
async fn test_open_ended_range() {
    let (_dir, path, data) = create_video_file(1000);
    let assembler = ResponseAssembler::new(100);

    let (status, headers, body) = run(&assembler, request(&path, 1000, Some("bytes=900-"))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 900-999/1000");
    assert_eq!(body, data[900..]);
}

#[tokio::test]
async fn test_omitted_start_reads_from_zero() {
    let (_dir, path, data) = create_video_file(1000);
    let assembler = ResponseAssembler::default();

    // Not a suffix range: "-500" means bytes 0 through 500.
    let (status, headers, body) = run(&assembler, request(&path, 1000, Some("bytes=-500"))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-500/1000");
    assert_eq!(body, data[..=500]);
}

#[tokio::test]
async fn test_malformed_headers_are_rejected() {
    let (_dir, path, _data) = create_video_file(100);
    let assembler = ResponseAssembler::default();

    for header_value in ["items=0-1", "bytes=abc-def", "bytes=0-1,5-6", "bytes=-", "bytes=50-10"] {
        let descriptor = assembler.assemble(request(&path, 100, Some(header_value)));
        assert!(descriptor.is_rejected(), "{header_value} should be rejected");
    }
}

#[tokio::test]
async fn test_file_truncated_after_resolution_fails_body() {
    let (_dir, path, _data) = create_video_file(1000);
    let assembler = ResponseAssembler::new(100);
    let descriptor = assembler.assemble(request(&path, 1000, None));

    // Headers already promise 1000 bytes.
    assert_eq!(descriptor.content_length(), Some(1000));
    std::fs::write(&path, vec![0u8; 250]).unwrap();

    let response = descriptor.into_response();
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_any_valid_range_returns_exact_slice(
        len in 1usize..4096,
        a in 0usize..4096,
        b in 0usize..4096,
        chunk in 1u32..700,
    ) {
        let start = a % len;
        let end = start + (b % (len - start));
        let (_dir, path, data) = create_video_file(len);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (status, headers, body) = runtime.block_on(run(
            &ResponseAssembler::new(chunk),
            request(&path, len as u64, Some(&format!("bytes={start}-{end}"))),
        ));

        prop_assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        let expected_length = (end - start + 1).to_string();
        prop_assert_eq!(headers[header::CONTENT_LENGTH].to_str().unwrap(), expected_length.as_str());
        prop_assert_eq!(&body[..], &data[start..=end]);
    }
}
