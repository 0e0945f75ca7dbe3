//! # citadel-core — Artifact Primitives
//!
//! Leaf crate of the Citadel artifact repository. Holds the pieces that have
//! no storage policy of their own:
//!
//! - [`coords`] — Maven-style artifact path parsing and classification
//!   (artifact / checksum sidecar / directory metadata).
//! - [`digest`] — the checksum engine: streaming MD5 + SHA-1 computation
//!   wrapped around any reader or writer, plus sidecar-file parsing.
//! - [`range`] — HTTP byte-range model and the range-stream adapter used
//!   for partial downloads.
//!
//! Everything here is synchronous and I/O-agnostic: callers hand in
//! `Read`/`Write`/`Seek` implementations and get the same back, augmented.

pub mod coords;
pub mod digest;
pub mod error;
pub mod range;

pub use coords::{ArtifactCoordinates, PathClass};
pub use digest::{ChecksumAlgorithm, DigestSet, DigestingReader, DigestingWriter};
pub use error::CoreError;
pub use range::{ByteRange, RangedSource};
