//! # Storage Error Types
//!
//! The domain error taxonomy surfaced by resolvers and the artifact
//! management service. The HTTP layer maps these onto status codes; the
//! variants carry enough context for its 404-ordering rules without any
//! re-inspection of the filesystem.

use citadel_core::CoreError;
use thiserror::Error;

/// Errors from the Citadel storage subsystem.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The resolver could not find the artifact path.
    #[error("artifact not found: {storage_id}:{repository_id}/{path}")]
    ArtifactNotFound {
        storage_id: String,
        repository_id: String,
        path: String,
    },

    /// No storage is configured under this id.
    #[error("the storage id does not exist: {0}")]
    StorageNotFound(String),

    /// The storage exists but has no repository under this id.
    #[error("the repository id does not exist: {0}")]
    RepositoryNotFound(String),

    /// The repository has been administratively taken out of service.
    #[error("repository {0} is out of service")]
    RepositoryOutOfService(String),

    /// The request path escapes the repository root or is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The path does not decompose into artifact coordinates.
    #[error("invalid artifact coordinates: {0}")]
    InvalidCoordinates(String),

    /// A version validator rejected the write.
    #[error("version policy violation: {0}")]
    VersionPolicyViolation(String),

    /// The artifact already exists and the repository forbids redeployment.
    #[error("redeployment forbidden: {0} is already deployed")]
    RedeploymentForbidden(String),

    /// Deploying to a group repository is not allowed.
    #[error("cannot deploy to group repository {0}")]
    WriteToGroupForbidden(String),

    /// Deleting from a group repository is not allowed.
    #[error("cannot delete from group repository {0}")]
    DeleteFromGroupForbidden(String),

    /// A `maven-metadata.xml` file could not be parsed.
    #[error("metadata is corrupt: {0}")]
    MetadataCorrupt(String),

    /// A streamed digest disagrees with a checksum sidecar.
    #[error("checksum mismatch for {path}: sidecar says {expected}, computed {computed}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        computed: String,
    },

    /// An unrecognized checksum algorithm name.
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCoordinates(msg) => StorageError::InvalidCoordinates(msg),
            CoreError::UnknownAlgorithm(name) => StorageError::UnknownAlgorithm(name),
            CoreError::RangeNotSatisfiable { offset, length } => StorageError::InvalidPath(
                format!("range offset {offset} beyond length {length}"),
            ),
            CoreError::Io(e) => StorageError::Io(e),
        }
    }
}

impl StorageError {
    /// Convenience constructor for the most common resolver failure.
    pub fn not_found(storage_id: &str, repository_id: &str, path: &str) -> Self {
        StorageError::ArtifactNotFound {
            storage_id: storage_id.to_string(),
            repository_id: repository_id.to_string(),
            path: path.to_string(),
        }
    }
}
