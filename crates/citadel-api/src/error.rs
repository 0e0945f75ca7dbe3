//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from citadel-storage and citadel-core to HTTP status
//! codes and returns JSON error bodies with a machine-readable code and a
//! human-readable message. Internal error details are logged, never sent
//! to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use citadel_core::CoreError;
use citadel_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type for the artifact HTTP surface.
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage, repository, or artifact path not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Validation or structural rejection (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Repository administratively out of service (503).
    #[error("service unavailable: {0}")]
    OutOfService(String),

    /// Requested range starts beyond the end of the artifact (416).
    #[error("range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    /// Internal failure (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::OutOfService(_) => (StatusCode::SERVICE_UNAVAILABLE, "OUT_OF_SERVICE"),
            Self::RangeNotSatisfiable(_) => {
                (StatusCode::RANGE_NOT_SATISFIABLE, "RANGE_NOT_SATISFIABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 416 responses carry no body at all: range-probing clients retry
        // with a plain GET and must not mistake an error body for content.
        if matches!(self, Self::RangeNotSatisfiable(_)) {
            return status.into_response();
        }

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::OutOfService(_) => tracing::warn!(error = %self, "repository out of service"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::ArtifactNotFound { .. }
            | StorageError::StorageNotFound(_)
            | StorageError::RepositoryNotFound(_) => Self::NotFound(err.to_string()),
            StorageError::RepositoryOutOfService(_) => Self::OutOfService(err.to_string()),
            StorageError::InvalidPath(_)
            | StorageError::InvalidCoordinates(_)
            | StorageError::VersionPolicyViolation(_)
            | StorageError::RedeploymentForbidden(_)
            | StorageError::WriteToGroupForbidden(_)
            | StorageError::DeleteFromGroupForbidden(_)
            | StorageError::ChecksumMismatch { .. }
            | StorageError::UnknownAlgorithm(_) => Self::BadRequest(err.to_string()),
            StorageError::MetadataCorrupt(_) | StorageError::Io(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::RangeNotSatisfiable { .. } => Self::RangeNotSatisfiable(err.to_string()),
            CoreError::InvalidCoordinates(_) | CoreError::UnknownAlgorithm(_) => {
                Self::BadRequest(err.to_string())
            }
            CoreError::Io(_) => Self::Internal(err.to_string()),
        }
    }
}
