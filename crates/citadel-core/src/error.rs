//! # Core Error Types
//!
//! Structured errors for coordinate parsing, checksum algorithms, and
//! byte-range handling. Uses `thiserror` for ergonomic definitions with
//! diagnostic context.

use thiserror::Error;

/// Errors from the artifact primitives in `citadel-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The path does not decompose into Maven-style artifact coordinates.
    #[error("invalid artifact coordinates: {0}")]
    InvalidCoordinates(String),

    /// The checksum algorithm name or extension is not recognized.
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The requested range starts at or beyond the end of the source.
    #[error("range not satisfiable: offset {offset} >= length {length}")]
    RangeNotSatisfiable { offset: u64, length: u64 },

    /// I/O error while positioning or reading a byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
