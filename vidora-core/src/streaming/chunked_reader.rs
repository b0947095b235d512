//! Lazy chunked reads over a byte range of a file.
//!
//! A [`ChunkedReader`] owns its file handle for its whole lifetime. The handle
//! is opened on the first poll and dropped when the range is exhausted, when a
//! read fails, or when the consumer drops the stream (client disconnect).

use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::{debug, error, trace};

use super::range::ByteRange;

/// Default upper bound for a single chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// One bounded buffer of file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    bytes: Bytes,
}

impl Chunk {
    /// Number of bytes in this chunk. Never exceeds the reader's chunk size.
    pub fn size(&self) -> u32 {
        // Chunks are built from reads capped at a u32 chunk size.
        u32::try_from(self.bytes.len()).unwrap_or(u32::MAX)
    }

    /// Borrowed view of the chunk contents.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

}

impl From<Chunk> for Bytes {
    fn from(chunk: Chunk) -> Self {
        chunk.bytes
    }
}

/// Failures that abort a chunk sequence once it has started.
#[derive(Debug, Error)]
pub enum ReadError {
    /// File disappeared between resolution and the first read.
    #[error("File missing: {path}")]
    FileMissing {
        /// Path that could not be opened.
        path: PathBuf,
    },

    /// File exists but could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        /// Path that could not be opened.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Seeking to the range start failed.
    #[error("Failed to seek to offset {position} in {path}: {source}")]
    Seek {
        /// Source being read.
        path: PathBuf,
        /// Requested offset.
        position: u64,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A read inside the range failed.
    #[error("Failed to read {path} at offset {position}: {source}")]
    Read {
        /// Source being read.
        path: PathBuf,
        /// Offset of the failed read.
        position: u64,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// File ended before the range was fully read.
    #[error("Unexpected end of file in {path} at offset {position}: {missing} bytes missing")]
    UnexpectedEof {
        /// Source being read.
        path: PathBuf,
        /// Offset where the file ended.
        position: u64,
        /// Bytes still owed to the current chunk.
        missing: u64,
    },
}

/// Lazy, finite, single-use sequence of [`Chunk`]s covering one [`ByteRange`].
///
/// Each item is either a chunk or a terminal [`ReadError`]; the stream ends
/// after the first error.
pub struct ChunkedReader {
    range: Option<ByteRange>,
    chunk_size: u32,
    inner: BoxStream<'static, Result<Chunk, ReadError>>,
}

impl ChunkedReader {
    /// Streams `range` from the file at `path`, at most `chunk_size` bytes per chunk.
    ///
    /// Nothing is opened until the stream is first polled.
    pub fn open(path: impl Into<PathBuf>, range: ByteRange, chunk_size: u32) -> Self {
        let path = path.into();
        let opener = open_file(path.clone()).boxed();
        Self::with_opener(path, opener, range, chunk_size)
    }

    /// Streams `range` from an already open seekable source.
    ///
    /// `label` only identifies the source in logs and errors.
    pub fn from_reader<R>(
        reader: R,
        label: impl Into<PathBuf>,
        range: ByteRange,
        chunk_size: u32,
    ) -> Self
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let opener = futures::future::ready(Ok(reader)).boxed();
        Self::with_opener(label.into(), opener, range, chunk_size)
    }

    /// Sequence that yields nothing, used for zero-length resources.
    pub fn empty() -> Self {
        Self {
            range: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            inner: stream::empty().boxed(),
        }
    }

    fn with_opener<R>(
        path: PathBuf,
        opener: BoxFuture<'static, Result<R, ReadError>>,
        range: ByteRange,
        chunk_size: u32,
    ) -> Self
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let cursor = ReadCursor {
            path,
            start: range.start(),
            end: range.end(),
            chunk_size: u64::from(chunk_size.max(1)),
            state: ReaderState::Pending(opener),
        };

        let inner = stream::unfold(cursor, |mut cursor| async move {
            cursor.advance().await.map(|item| (item, cursor))
        })
        .boxed();

        Self {
            range: Some(range),
            chunk_size: chunk_size.max(1),
            inner,
        }
    }

    /// Maximum size of a single chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Total bytes the sequence yields when no error occurs.
    pub fn expected_len(&self) -> u64 {
        self.range.map_or(0, |range| range.len())
    }
}

impl Stream for ChunkedReader {
    type Item = Result<Chunk, ReadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ChunkedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedReader")
            .field("range", &self.range)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

enum ReaderState<R> {
    /// Source not yet acquired.
    Pending(BoxFuture<'static, Result<R, ReadError>>),
    /// Source positioned at `pos`.
    Reading { source: R, pos: u64 },
    /// Range exhausted or aborted; the source has been dropped.
    Finished,
}

struct ReadCursor<R> {
    path: PathBuf,
    start: u64,
    end: u64,
    chunk_size: u64,
    state: ReaderState<R>,
}

impl<R> ReadCursor<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    /// Moves the state machine one chunk forward.
    ///
    /// Every exit that does not store a new `Reading` state leaves the cursor
    /// `Finished`, which drops the source.
    async fn advance(&mut self) -> Option<Result<Chunk, ReadError>> {
        loop {
            match std::mem::replace(&mut self.state, ReaderState::Finished) {
                ReaderState::Finished => return None,
                ReaderState::Pending(opener) => {
                    let source = match opener.await {
                        Ok(source) => source,
                        Err(e) => return Some(Err(self.fail(e))),
                    };
                    match seek_start(&self.path, source, self.start).await {
                        Ok(source) => {
                            self.state = ReaderState::Reading {
                                source,
                                pos: self.start,
                            };
                        }
                        Err(e) => return Some(Err(self.fail(e))),
                    }
                }
                ReaderState::Reading { mut source, pos } => {
                    let remaining = if pos > self.end {
                        0
                    } else {
                        (self.end - pos).saturating_add(1)
                    };
                    let read_size = remaining.min(self.chunk_size);
                    if read_size == 0 {
                        debug!(
                            "Completed range {}-{} of {}",
                            self.start,
                            self.end,
                            self.path.display()
                        );
                        return None;
                    }

                    return match read_chunk(&self.path, &mut source, pos, read_size).await {
                        Ok(bytes) => {
                            trace!(
                                "Read {} bytes at offset {} from {}",
                                read_size,
                                pos,
                                self.path.display()
                            );
                            self.state = ReaderState::Reading {
                                source,
                                pos: pos + read_size,
                            };
                            Some(Ok(Chunk { bytes }))
                        }
                        Err(e) => Some(Err(self.fail(e))),
                    };
                }
            }
        }
    }

    fn fail(&self, e: ReadError) -> ReadError {
        error!("Aborting stream of {}: {}", self.path.display(), e);
        e
    }
}

async fn seek_start<R>(path: &Path, mut source: R, start: u64) -> Result<R, ReadError>
where
    R: AsyncSeek + Unpin,
{
    source
        .seek(SeekFrom::Start(start))
        .await
        .map_err(|source| ReadError::Seek {
            path: path.to_path_buf(),
            position: start,
            source,
        })?;
    debug!("Opened {} at offset {}", path.display(), start);
    Ok(source)
}

/// Reads exactly `len` bytes at `pos`; a short read is an error.
async fn read_chunk<R>(path: &Path, source: &mut R, pos: u64, len: u64) -> Result<Bytes, ReadError>
where
    R: AsyncRead + Unpin,
{
    let len = usize::try_from(len).map_err(|_| ReadError::Read {
        path: path.to_path_buf(),
        position: pos,
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "chunk too large"),
    })?;
    let mut buffer = BytesMut::zeroed(len);
    let mut filled = 0;

    while filled < len {
        let read = source
            .read(&mut buffer[filled..])
            .await
            .map_err(|source| ReadError::Read {
                path: path.to_path_buf(),
                position: pos + filled as u64,
                source,
            })?;
        if read == 0 {
            return Err(ReadError::UnexpectedEof {
                path: path.to_path_buf(),
                position: pos + filled as u64,
                missing: (len - filled) as u64,
            });
        }
        filled += read;
    }

    Ok(buffer.freeze())
}

async fn open_file(path: PathBuf) -> Result<File, ReadError> {
    File::open(&path).await.map_err(|source| open_error(&path, source))
}

fn open_error(path: &Path, source: std::io::Error) -> ReadError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ReadError::FileMissing {
            path: path.to_path_buf(),
        }
    } else {
        ReadError::Open {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::TryStreamExt;
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn collect(reader: ChunkedReader) -> Result<Vec<Chunk>, ReadError> {
        reader.try_collect().await
    }

    fn span(start: u64, end: u64) -> ByteRange {
        ByteRange::new(start, end, end + 1).unwrap()
    }

    fn concat(chunks: &[Chunk]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.bytes().to_vec()).collect()
    }

    /// Reader that records when it is dropped.
    struct DropFlag<R> {
        inner: R,
        dropped: Arc<AtomicBool>,
    }

    impl<R> Drop for DropFlag<R> {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl<R: AsyncRead + Unpin> AsyncRead for DropFlag<R> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl<R: AsyncSeek + Unpin> AsyncSeek for DropFlag<R> {
        fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
            Pin::new(&mut self.inner).start_seek(position)
        }

        fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
            Pin::new(&mut self.inner).poll_complete(cx)
        }
    }

    #[tokio::test]
    async fn test_reads_exact_range_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        let data = patterned(1000);
        tokio::fs::write(&path, &data).await.unwrap();

        let range = span(100, 199);
        let chunks = collect(ChunkedReader::open(&path, range, 32)).await.unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(
            chunks.iter().map(Chunk::size).collect::<Vec<_>>(),
            vec![32, 32, 32, 4]
        );
        assert_eq!(concat(&chunks), &data[100..200]);
    }

    #[tokio::test]
    async fn test_single_byte_range() {
        let data = patterned(1000);
        let range = span(999, 999);
        let reader = ChunkedReader::from_reader(Cursor::new(data.clone()), "mem", range, 1024);

        let chunks = collect(reader).await.unwrap();
        assert_eq!(concat(&chunks), vec![data[999]]);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_on_first_poll() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.mp4");
        let mut reader = ChunkedReader::open(&path, span(0, 9), 4);

        let first = reader.next().await.unwrap();
        assert!(matches!(first, Err(ReadError::FileMissing { .. })));
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_file_errors_instead_of_short_chunk() {
        let data = patterned(50);
        // Range claims 100 bytes but the source holds 50.
        let reader = ChunkedReader::from_reader(
            Cursor::new(data),
            "truncated",
            span(0, 99),
            40,
        );
        let items: Vec<_> = reader.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().size(), 40);
        match &items[1] {
            Err(ReadError::UnexpectedEof {
                position, missing, ..
            }) => {
                assert_eq!(*position, 50);
                assert_eq!(*missing, 30);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_source_released_on_completion() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = DropFlag {
            inner: Cursor::new(patterned(64)),
            dropped: dropped.clone(),
        };
        let mut reader =
            ChunkedReader::from_reader(source, "flag", span(0, 63), 64);

        assert!(reader.next().await.unwrap().is_ok());
        assert!(!dropped.load(Ordering::SeqCst));
        assert!(reader.next().await.is_none());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_source_released_when_consumer_stops_early() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = DropFlag {
            inner: Cursor::new(patterned(4096)),
            dropped: dropped.clone(),
        };
        let mut reader =
            ChunkedReader::from_reader(source, "flag", span(0, 4095), 16);

        assert!(reader.next().await.unwrap().is_ok());
        assert!(!dropped.load(Ordering::SeqCst));
        drop(reader);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_source_released_after_error() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = DropFlag {
            inner: Cursor::new(patterned(10)),
            dropped: dropped.clone(),
        };
        let mut reader =
            ChunkedReader::from_reader(source, "flag", span(0, 19), 64);

        assert!(reader.next().await.unwrap().is_err());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_range_at_largest_offset_fails_without_overflow() {
        let last = u64::MAX - 1;
        let range = ByteRange::new(last, last, u64::MAX).unwrap();
        let mut reader = ChunkedReader::from_reader(Cursor::new(patterned(8)), "mem", range, 64);
        assert_eq!(reader.expected_len(), 1);

        match reader.next().await.unwrap() {
            Err(ReadError::UnexpectedEof {
                position, missing, ..
            }) => {
                assert_eq!(position, last);
                assert_eq!(missing, 1);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_reader_yields_nothing() {
        let reader = ChunkedReader::empty();
        assert_eq!(reader.expected_len(), 0);
        assert!(collect(reader).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_still_makes_progress() {
        let reader = ChunkedReader::from_reader(
            Cursor::new(patterned(8)),
            "mem",
            span(0, 7),
            0,
        );
        assert_eq!(reader.chunk_size(), 1);
        assert_eq!(collect(reader).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_readers_are_independent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.mp4");
        let data = patterned(10_000);
        tokio::fs::write(&path, &data).await.unwrap();

        let a = collect(ChunkedReader::open(&path, span(0, 4999), 700));
        let b = collect(ChunkedReader::open(&path, span(5000, 9999), 300));
        let (a, b) = tokio::join!(a, b);

        assert_eq!(concat(&a.unwrap()), &data[..5000]);
        assert_eq!(concat(&b.unwrap()), &data[5000..]);
    }

    proptest! {
        #[test]
        fn prop_chunk_count_and_sizes(len in 1usize..4096, chunk in 1u32..512, offset in 0usize..64) {
            let data = patterned(len + offset);
            let range = span(offset as u64, (offset + len - 1) as u64);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let chunks = runtime
                .block_on(collect(ChunkedReader::from_reader(Cursor::new(data.clone()), "mem", range, chunk)))
                .unwrap();

            let expected_count = len.div_ceil(chunk as usize);
            prop_assert_eq!(chunks.len(), expected_count);
            let (last, rest) = chunks.split_last().unwrap();
            prop_assert!(rest.iter().all(|c| c.size() == chunk));
            prop_assert!(last.size() <= chunk);
            prop_assert_eq!(concat(&chunks), data[offset..offset + len].to_vec());
        }
    }
}
