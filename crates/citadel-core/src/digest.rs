//! # Checksum Engine
//!
//! Streaming MD5 + SHA-1 computation wrapped around arbitrary readers and
//! writers. Artifact bytes are digested exactly once, while they flow
//! through the server, never in a second pass over the file.
//!
//! Sidecar files (`<artifact>.md5`, `<artifact>.sha1`) hold a single
//! lowercase hex token; [`parse_checksum_token`] extracts it, tolerating
//! trailing filenames the way `md5sum`-style output writes them.

use std::io::{Read, Write};
use std::str::FromStr;

use md5::{Digest, Md5};
use sha1::Sha1;

use crate::error::CoreError;

/// A checksum algorithm with a sidecar file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
}

/// All supported algorithms, in sidecar-generation order.
pub const ALGORITHMS: [ChecksumAlgorithm; 2] =
    [ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha1];

impl ChecksumAlgorithm {
    /// Canonical lowercase name, also the sidecar file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(ChecksumAlgorithm::Sha1),
            other => Err(CoreError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Final digests of one byte stream, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSet {
    pub md5: String,
    pub sha1: String,
}

impl DigestSet {
    /// The digest for one algorithm.
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> &str {
        match algorithm {
            ChecksumAlgorithm::Md5 => &self.md5,
            ChecksumAlgorithm::Sha1 => &self.sha1,
        }
    }
}

/// Running MD5 + SHA-1 state shared by the reader and writer wrappers.
#[derive(Default)]
struct DigestState {
    md5: Md5,
    sha1: Sha1,
}

impl DigestState {
    fn update(&mut self, bytes: &[u8]) {
        self.md5.update(bytes);
        self.sha1.update(bytes);
    }

    fn finalize(self) -> DigestSet {
        DigestSet {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finalize()),
        }
    }
}

/// Digest the complete byte slice in one call.
pub fn digest_bytes(bytes: &[u8]) -> DigestSet {
    let mut state = DigestState::default();
    state.update(bytes);
    state.finalize()
}

/// A reader that transparently forwards reads while digesting everything
/// that passes through it.
pub struct DigestingReader<R> {
    inner: R,
    state: DigestState,
}

impl<R: Read> DigestingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: DigestState::default(),
        }
    }

    /// Consume the reader, yielding the digests of all bytes read so far.
    pub fn finalize(self) -> DigestSet {
        self.state.finalize()
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.state.update(&buf[..n]);
        Ok(n)
    }
}

/// A writer that transparently forwards writes while digesting everything
/// that passes through it.
pub struct DigestingWriter<W> {
    inner: W,
    state: DigestState,
}

impl<W: Write> DigestingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            state: DigestState::default(),
        }
    }

    /// Flush and consume the writer, yielding the sink and the digests of
    /// all bytes written.
    pub fn finalize(mut self) -> std::io::Result<(W, DigestSet)> {
        self.inner.flush()?;
        Ok((self.inner, self.state.finalize()))
    }
}

impl<W: Write> Write for DigestingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.state.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Parse a checksum sidecar body: the first whitespace-delimited token,
/// or `None` when the file is blank.
pub fn parse_checksum_token(contents: &str) -> Option<String> {
    contents
        .split_whitespace()
        .next()
        .map(|token| token.to_string())
}
