//! Response assembly for byte-range video streaming.
//!
//! Combines a parsed `Range` header with a [`ChunkedReader`] into a
//! [`ResponseDescriptor`]: status, headers and a lazy body. The descriptor
//! converts into an axum response without buffering the file.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::chunked_reader::{ChunkedReader, DEFAULT_CHUNK_SIZE};
use super::range::{ByteRange, RangeError, parse_range};
use crate::config::StreamingConfig;

/// Media type sent with every streamed video.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// A resolved file plus the client's optional `Range` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Location of the media file on disk.
    pub file_path: PathBuf,
    /// Display name used in logs.
    pub file_name: String,
    /// Size of the file in bytes at resolution time.
    pub total_size: u64,
    /// Raw `Range` header value, if the client sent one.
    pub range_header: Option<String>,
}

/// Outcome class of a streaming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Whole file, no range requested.
    Ok,
    /// A single satisfiable range.
    PartialContent,
    /// Range was malformed or out of bounds.
    RangeNotSatisfiable,
}

impl StreamStatus {
    /// HTTP status code for this outcome.
    pub fn status_code(self) -> StatusCode {
        match self {
            StreamStatus::Ok => StatusCode::OK,
            StreamStatus::PartialContent => StatusCode::PARTIAL_CONTENT,
            StreamStatus::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

/// Status, headers and lazy body for one streaming response.
///
/// Owned entirely by the caller; nothing is shared with the assembler.
#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StreamStatus,
    pub headers: HeaderMap,
    /// Chunk sequence, absent for rejected requests.
    pub body: Option<ChunkedReader>,
    /// Diagnostic for rejected requests.
    pub message: Option<String>,
}

impl ResponseDescriptor {
    /// True when the range was refused and no body will be sent.
    pub fn is_rejected(&self) -> bool {
        self.status == StreamStatus::RangeNotSatisfiable
    }

    /// Value of `Content-Length`, if set.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }
}

impl IntoResponse for ResponseDescriptor {
    fn into_response(self) -> Response {
        let body = match self.body {
            Some(reader) => Body::from_stream(reader),
            None => Body::empty(),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status.status_code();
        *response.headers_mut() = self.headers;
        response
    }
}

/// Builds [`ResponseDescriptor`]s for resolved files.
#[derive(Debug, Clone, Copy)]
pub struct ResponseAssembler {
    chunk_size: u32,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ResponseAssembler {
    /// Creates an assembler that reads `chunk_size` bytes per chunk.
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Creates an assembler from streaming configuration.
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(config.chunk_size)
    }

    /// Chunk size used for response bodies.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Validates the request's range and binds a lazy body to it.
    ///
    /// A rejected range yields a `RangeNotSatisfiable` descriptor with no body;
    /// no file is touched in that case.
    pub fn assemble(&self, request: StreamRequest) -> ResponseDescriptor {
        let StreamRequest {
            file_path,
            file_name,
            total_size,
            range_header,
        } = request;

        match parse_range(range_header.as_deref(), total_size) {
            Ok(Some(range)) => {
                info!("Streaming range {} for {}", range, file_name);
                let mut headers = base_headers(range.len());
                headers.insert(
                    header::CONTENT_RANGE,
                    header_value(&range.content_range(total_size)),
                );
                ResponseDescriptor {
                    status: StreamStatus::PartialContent,
                    headers,
                    body: Some(ChunkedReader::open(file_path, range, self.chunk_size)),
                    message: None,
                }
            }
            Ok(None) => {
                info!("Streaming entire file: {}", file_name);
                let body = match ByteRange::full(total_size) {
                    Some(range) => ChunkedReader::open(file_path, range, self.chunk_size),
                    None => ChunkedReader::empty(),
                };
                ResponseDescriptor {
                    status: StreamStatus::Ok,
                    headers: base_headers(total_size),
                    body: Some(body),
                    message: None,
                }
            }
            Err(e) => self.reject(&file_name, total_size, e),
        }
    }

    fn reject(&self, file_name: &str, total_size: u64, error: RangeError) -> ResponseDescriptor {
        warn!("Rejecting range for {}: {}", file_name, error);
        let mut headers = base_headers(0);
        headers.insert(
            header::CONTENT_RANGE,
            header_value(&format!("bytes */{total_size}")),
        );
        ResponseDescriptor {
            status: StreamStatus::RangeNotSatisfiable,
            headers,
            body: None,
            message: Some(error.to_string()),
        }
    }
}

/// Headers sent with every streaming response.
fn base_headers(content_length: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(VIDEO_CONTENT_TYPE),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("bytes */0"))
}
