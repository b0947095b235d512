//! Byte-range streaming engine.
//!
//! Turns a resolved media file plus an optional `Range` header into a
//! status, a header set and a lazily read body. The pipeline is
//! `range` (parse and validate) -> `assembler` (status and headers) ->
//! `chunked_reader` (bounded reads, opened on first poll).

pub mod assembler;
pub mod chunked_reader;
pub mod range;

pub use assembler::{
    ResponseAssembler, ResponseDescriptor, StreamRequest, StreamStatus, VIDEO_CONTENT_TYPE,
};
pub use chunked_reader::{Chunk, ChunkedReader, DEFAULT_CHUNK_SIZE, ReadError};
pub use range::{ByteRange, RangeError, RangeRejection, parse_range};
