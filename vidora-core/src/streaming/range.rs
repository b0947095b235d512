//! HTTP `Range` header parsing for single byte ranges.
//!
//! Only the `bytes=<start>-<end>` form is accepted. An omitted start is read
//! as offset zero rather than as a suffix length, so `bytes=-500` selects
//! bytes `0..=500`, not the last 500 bytes.

use std::fmt;

use thiserror::Error;

/// Unit prefix every accepted range header must carry.
const BYTES_UNIT: &str = "bytes=";

/// Inclusive byte interval within a resource of known size.
///
/// Always satisfies `start <= end < total_size` for the size it was parsed
/// against; the only way to build one outside this module is [`ByteRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Creates a range, rejecting intervals that fall outside `total_size`.
    ///
    /// # Errors
    ///
    /// - `RangeError::Unsatisfiable` - Start past end, or either bound at or past `total_size`
    pub fn new(start: u64, end: u64, total_size: u64) -> Result<Self, RangeError> {
        let reason = if start >= total_size {
            Some(RangeRejection::StartOutOfBounds)
        } else if end >= total_size {
            Some(RangeRejection::EndOutOfBounds)
        } else if start > end {
            Some(RangeRejection::StartAfterEnd)
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RangeError::Unsatisfiable {
                header: format!("{BYTES_UNIT}{start}-{end}"),
                reason,
            }),
            None => Ok(Self { start, end }),
        }
    }

    /// First byte offset, inclusive.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset, inclusive.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Range covering a whole non-empty resource.
    pub fn full(total_size: u64) -> Option<Self> {
        total_size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes covered, both bounds included.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A valid range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` header of a partial response.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Why a range header was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRejection {
    /// Header does not start with `bytes=`.
    MissingUnit,
    /// Bounds are not `<digits>-<digits>` with at most one side empty.
    Malformed,
    /// Start offset lies at or beyond the end of the resource.
    StartOutOfBounds,
    /// End offset lies at or beyond the end of the resource.
    EndOutOfBounds,
    /// Start offset is greater than end offset.
    StartAfterEnd,
}

impl fmt::Display for RangeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RangeRejection::MissingUnit => "missing bytes unit",
            RangeRejection::Malformed => "malformed range",
            RangeRejection::StartOutOfBounds => "start beyond resource size",
            RangeRejection::EndOutOfBounds => "end beyond resource size",
            RangeRejection::StartAfterEnd => "start after end",
        };
        f.write_str(text)
    }
}

/// Errors produced while interpreting a `Range` header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The header is malformed or does not fit inside the resource.
    #[error("Invalid range requested: {header} ({reason})")]
    Unsatisfiable {
        /// Raw header value as received.
        header: String,
        /// Structured cause of the rejection.
        reason: RangeRejection,
    },
}

impl RangeError {
    /// Structured cause of the rejection.
    pub fn reason(&self) -> RangeRejection {
        match self {
            RangeError::Unsatisfiable { reason, .. } => *reason,
        }
    }
}

/// Parses an optional `Range` header against a resource of `total_size` bytes.
///
/// Returns `Ok(None)` when no header was sent, meaning the full resource.
///
/// # Errors
///
/// - `RangeError::Unsatisfiable` - Header is malformed or out of bounds
///
/// # Examples
/// ```
/// use vidora_core::streaming::range::{ByteRange, parse_range};
///
/// let range = parse_range(Some("bytes=100-199"), 1000).unwrap().unwrap();
/// assert_eq!((range.start(), range.end()), (100, 199));
/// assert_eq!(range, ByteRange::new(100, 199, 1000).unwrap());
/// ```
pub fn parse_range(
    range_header: Option<&str>,
    total_size: u64,
) -> Result<Option<ByteRange>, RangeError> {
    let Some(header) = range_header else {
        return Ok(None);
    };

    let reject = |reason| RangeError::Unsatisfiable {
        header: header.to_string(),
        reason,
    };

    let spec = header
        .trim()
        .strip_prefix(BYTES_UNIT)
        .ok_or_else(|| reject(RangeRejection::MissingUnit))?;
    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| reject(RangeRejection::Malformed))?;

    let start = parse_bound(start_str).map_err(|_| reject(RangeRejection::Malformed))?;
    let end = parse_bound(end_str).map_err(|_| reject(RangeRejection::Malformed))?;

    let (start, end) = match (start, end) {
        (None, None) => return Err(reject(RangeRejection::Malformed)),
        (Some(start), Some(end)) => (start, end),
        (None, Some(end)) => (0, end),
        (Some(start), None) => {
            let last = total_size
                .checked_sub(1)
                .ok_or_else(|| reject(RangeRejection::StartOutOfBounds))?;
            (start, last)
        }
    };

    ByteRange::new(start, end, total_size)
        .map(Some)
        .map_err(|err| reject(err.reason()))
}

/// Parses one side of `<start>-<end>`; empty means omitted.
fn parse_bound(raw: &str) -> Result<Option<u64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    raw.parse::<u64>().map(Some).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_absent_header_is_full_file() {
        assert_eq!(parse_range(None, 1000), Ok(None));
    }

    #[test]
    fn test_closed_range() {
        let range = parse_range(Some("bytes=100-199"), 1000).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 199 });
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn test_open_end_runs_to_last_byte() {
        let range = parse_range(Some("bytes=500-"), 1000).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 500, end: 999 });
    }

    #[test]
    fn test_omitted_start_reads_from_zero() {
        // Not a suffix range: bytes=-500 means 0..=500.
        let range = parse_range(Some("bytes=-500"), 1000).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 500 });
    }

    #[test]
    fn test_single_last_byte() {
        let range = parse_range(Some("bytes=999-999"), 1000).unwrap().unwrap();
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_out_of_bounds_rejections() {
        let cases = [
            ("bytes=1000-1000", RangeRejection::StartOutOfBounds),
            ("bytes=0-1000", RangeRejection::EndOutOfBounds),
            ("bytes=200-100", RangeRejection::StartAfterEnd),
            ("bytes=1000-", RangeRejection::StartOutOfBounds),
        ];

        for (header, expected) in cases {
            let err = parse_range(Some(header), 1000).unwrap_err();
            assert_eq!(err.reason(), expected, "header {header}");
        }
    }

    #[test]
    fn test_malformed_rejections() {
        let cases = [
            ("100-199", RangeRejection::MissingUnit),
            ("items=0-1", RangeRejection::MissingUnit),
            ("bytes=", RangeRejection::Malformed),
            ("bytes=-", RangeRejection::Malformed),
            ("bytes=abc-10", RangeRejection::Malformed),
            ("bytes=+5-10", RangeRejection::Malformed),
            ("bytes=0-10,20-30", RangeRejection::Malformed),
            ("bytes=99999999999999999999-", RangeRejection::Malformed),
        ];

        for (header, expected) in cases {
            let err = parse_range(Some(header), 1000).unwrap_err();
            assert_eq!(err.reason(), expected, "header {header}");
        }
    }

    #[test]
    fn test_empty_resource_rejects_every_range() {
        assert!(parse_range(Some("bytes=0-"), 0).is_err());
        assert!(parse_range(Some("bytes=0-0"), 0).is_err());
        assert!(parse_range(Some("bytes=-0"), 0).is_err());
        assert_eq!(parse_range(None, 0), Ok(None));
    }

    #[test]
    fn test_error_message_carries_header() {
        let err = parse_range(Some("bytes=1000-1000"), 1000).unwrap_err();
        assert!(err.to_string().contains("bytes=1000-1000"));
    }

    #[test]
    fn test_inverted_range_never_constructed() {
        let err = ByteRange::new(10, 5, 100).unwrap_err();
        assert_eq!(err.reason(), RangeRejection::StartAfterEnd);
    }

    #[test]
    fn test_largest_range_has_no_overflow() {
        let range = ByteRange::new(0, u64::MAX - 1, u64::MAX).unwrap();
        assert_eq!((range.start(), range.end()), (0, u64::MAX - 1));
        assert_eq!(range.len(), u64::MAX);
    }

    #[test]
    fn test_full_range() {
        assert_eq!(ByteRange::full(0), None);
        assert_eq!(ByteRange::full(10), Some(ByteRange { start: 0, end: 9 }));
    }

    proptest! {
        #[test]
        fn prop_valid_ranges_round_trip(total in 1u64..1_000_000, a in any::<u64>(), b in any::<u64>()) {
            let start = a % total;
            let end = start + b % (total - start);
            let header = format!("bytes={start}-{end}");
            let range = parse_range(Some(&header), total).unwrap().unwrap();
            prop_assert_eq!(range, ByteRange { start, end });
            prop_assert_eq!(range.len(), end - start + 1);
        }

        #[test]
        fn prop_invalid_bounds_rejected(total in 1u64..1_000_000, start in any::<u32>(), end in any::<u32>()) {
            let (start, end) = (u64::from(start), u64::from(end));
            prop_assume!(start >= total || end >= total || start > end);
            let header = format!("bytes={start}-{end}");
            prop_assert!(parse_range(Some(&header), total).is_err());
        }
    }
}
