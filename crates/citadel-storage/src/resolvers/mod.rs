//! # Location Resolvers
//!
//! A [`LocationResolver`] maps a logical `(storage, repository, path)`
//! triple onto bytes. Two strategies exist:
//!
//! - [`fs::FsResolver`] — the only resolver that owns bytes; backed by the
//!   repository's base directory. Serves `hosted` and `proxy` repositories
//!   (a proxy serves its local cache directory; remote fetching is not in
//!   scope).
//! - [`group::GroupResolver`] — owns nothing; walks an ordered member list
//!   and forwards, with cycle-safe DFS over nested groups.
//!
//! The resolver registry (`repository.type → resolver`) is assembled once
//! at startup by the artifact management service.

use std::io::{Read, Seek};

use citadel_core::digest::DigestSet;

use crate::error::StorageError;

pub mod fs;
pub mod group;

/// A readable, seekable artifact byte source of known length.
///
/// Wraps the backing file (or an in-memory buffer in tests) so callers can
/// layer range bounding and digesting on top without caring which resolver
/// produced it.
pub struct ArtifactStream {
    reader: Box<dyn ReadSeek>,
    length: u64,
}

/// Object-safe `Read + Seek` bound for boxed artifact sources.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

impl ArtifactStream {
    pub fn from_file(file: std::fs::File) -> std::io::Result<Self> {
        let length = file.metadata()?.len();
        Ok(Self {
            reader: Box::new(file),
            length,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len() as u64;
        Self {
            reader: Box::new(std::io::Cursor::new(bytes)),
            length,
        }
    }

    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Read the remaining bytes to a vector.
    pub fn read_to_vec(mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.length as usize);
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for ArtifactStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for ArtifactStream {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

/// What a completed store produced.
#[derive(Debug)]
pub struct StoreOutcome {
    /// Digests of the streamed artifact bytes. `None` for verbatim sidecar
    /// writes, which are not digested.
    pub digests: Option<DigestSet>,
}

/// Common contract of all resolvers.
pub trait LocationResolver: Send + Sync {
    /// Open a byte source, or fail with [`StorageError::ArtifactNotFound`].
    fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ArtifactStream, StorageError>;

    /// Create or overwrite the artifact, making the write visible
    /// atomically.
    fn store(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        source: &mut dyn Read,
    ) -> Result<StoreOutcome, StorageError>;

    /// Remove the artifact and its checksum sidecars. With `force = false`
    /// the artifact is preserved in the repository trash (when enabled);
    /// `force = true` always removes permanently.
    fn delete(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<(), StorageError>;

    /// Side-effect-free existence check.
    fn contains(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<bool, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_stream_from_bytes_reports_length() {
        let stream = ArtifactStream::from_bytes(b"0123456789".to_vec());
        assert_eq!(stream.len(), 10);
        assert!(!stream.is_empty());
        assert_eq!(stream.read_to_vec().unwrap(), b"0123456789");
    }

    #[test]
    fn artifact_stream_from_file_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"abc").unwrap();

        let stream = ArtifactStream::from_file(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.read_to_vec().unwrap(), b"abc");
    }

    #[test]
    fn artifact_stream_is_seekable() {
        use std::io::{Read, Seek, SeekFrom};
        let mut stream = ArtifactStream::from_bytes(b"0123456789".to_vec());
        stream.seek(SeekFrom::Start(7)).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "789");
    }
}
