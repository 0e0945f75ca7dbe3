//! # Byte Ranges & the Range-Stream Adapter
//!
//! Models HTTP `Range` requests for partial artifact downloads. A
//! [`ByteRange`] is `(offset, limit)` where `limit` is an exclusive end
//! offset and `limit = 0` means "to end of file". [`RangedSource`] wraps a
//! seekable byte source of known length and bounds reads to the active
//! range.
//!
//! ## Header Parsing
//!
//! Only the `bytes=offset[-limit]` form is honored. The header values
//! `"0/*"`, `"0-"` and `"0"` are sentinels meaning "not a range request"
//! (build tools send them to probe resumability), and anything unparsable
//! is likewise treated as not ranged rather than rejected.

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::CoreError;

/// A byte range: `offset` is inclusive, `limit` is an exclusive end offset,
/// `limit = 0` denotes "to end of file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub limit: u64,
}

impl ByteRange {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// A range from `offset` to the end of the source.
    pub fn to_end(offset: u64) -> Self {
        Self { offset, limit: 0 }
    }

    /// Number of bytes this range selects from a source of `total` length.
    pub fn length_within(&self, total: u64) -> u64 {
        let end = if self.limit == 0 {
            total
        } else {
            self.limit.min(total)
        };
        end.saturating_sub(self.offset)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.limit == 0 {
            write!(f, "{}-", self.offset)
        } else {
            write!(f, "{}-{}", self.offset, self.limit)
        }
    }
}

/// Header values that disable ranged handling entirely.
const NOT_A_RANGE: [&str; 3] = ["0/*", "0-", "0"];

/// Parse an HTTP `Range` header value into byte ranges.
///
/// Returns `None` when the request should be served as a regular full
/// download: sentinel values, a missing `bytes=` prefix, or any syntax the
/// parser does not understand.
pub fn parse_range_header(value: &str) -> Option<Vec<ByteRange>> {
    let value = value.trim();
    if NOT_A_RANGE.contains(&value) {
        return None;
    }
    let spec = value.strip_prefix("bytes=")?;

    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        let range = match part.split_once('-') {
            Some((offset, "")) => ByteRange::to_end(offset.parse().ok()?),
            Some((offset, limit)) => {
                ByteRange::new(offset.parse().ok()?, limit.parse().ok()?)
            }
            None => ByteRange::to_end(part.parse().ok()?),
        };
        ranges.push(range);
    }
    if ranges.is_empty() {
        None
    } else {
        Some(ranges)
    }
}

/// The `Content-Range` header value for a partial response covering
/// `range` of a source of `length` bytes.
pub fn content_range_header(range: &ByteRange, length: u64) -> String {
    format!("bytes {}-{}/{}", range.offset, length.saturating_sub(1), length)
}

/// A seekable byte source of known length, bounded to an active range.
///
/// Freshly constructed, the source covers the full `0..length` span;
/// [`set_range`](RangedSource::set_range) repositions it.
pub struct RangedSource<R> {
    inner: R,
    length: u64,
    range: ByteRange,
    remaining: u64,
}

impl<R: Read + Seek> RangedSource<R> {
    pub fn new(inner: R, length: u64) -> Self {
        Self {
            inner,
            length,
            range: ByteRange::to_end(0),
            remaining: length,
        }
    }

    /// Total length of the underlying source.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The active range, for building response headers.
    pub fn current_range(&self) -> ByteRange {
        self.range
    }

    /// Position the source at `range.offset` and bound subsequent reads to
    /// the range. Fails with [`CoreError::RangeNotSatisfiable`] when the
    /// offset is at or beyond the end of the source.
    pub fn set_range(&mut self, range: ByteRange) -> Result<(), CoreError> {
        if range.offset >= self.length {
            return Err(CoreError::RangeNotSatisfiable {
                offset: range.offset,
                length: self.length,
            });
        }
        self.inner.seek(SeekFrom::Start(range.offset))?;
        self.remaining = range.length_within(self.length);
        self.range = range;
        Ok(())
    }

    /// Turn this source into an iterator of `(range, sub-source)` pairs for
    /// a multi-range request. Each sub-source holds the bytes of one range;
    /// multipart body formatting is the HTTP layer's concern.
    pub fn into_sub_sources(self, ranges: Vec<ByteRange>) -> SubSources<R> {
        SubSources {
            source: self,
            ranges: ranges.into_iter(),
        }
    }
}

impl<R: Read + Seek> Read for RangedSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = self.remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Iterator over the `(range, sub-source)` pairs of a multi-range request.
pub struct SubSources<R> {
    source: RangedSource<R>,
    ranges: std::vec::IntoIter<ByteRange>,
}

impl<R: Read + Seek> Iterator for SubSources<R> {
    type Item = Result<(ByteRange, Cursor<Vec<u8>>), CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.ranges.next()?;
        let mut bytes = Vec::new();
        let result = self
            .source
            .set_range(range)
            .and_then(|()| self.source.read_to_end(&mut bytes).map_err(CoreError::from));
        match result {
            Ok(_) => Some(Ok((range, Cursor::new(bytes)))),
            Err(e) => Some(Err(e)),
        }
    }
}
