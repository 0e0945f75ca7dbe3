//! # Artifact Operations API
//!
//! The `/storages` surface consumed by build tools: upload (`PUT`),
//! download (`GET`, honoring `Range`), server-side copy (`POST
//! /storages/copy/...`), and delete (`DELETE`, with optional `force`).
//!
//! `GET` responses always advertise `Accept-Ranges: bytes`, derive
//! `Content-Type` from the path class, and — when the repository enables
//! it — carry `Checksum-MD5` / `Checksum-SHA1` headers read from the
//! sidecar files. Multi-range requests are served as a full-content `200`;
//! multipart range bodies are not composed here.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, RANGE,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use citadel_core::coords::PathClass;
use citadel_core::digest::ChecksumAlgorithm;
use citadel_core::range::{content_range_header, parse_range_header, RangedSource};
use serde::Deserialize;
use std::io::Read;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

static CHECKSUM_MD5: HeaderName = HeaderName::from_static("checksum-md5");
static CHECKSUM_SHA1: HeaderName = HeaderName::from_static("checksum-sha1");

/// Build the artifacts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/storages/copy/*path", post(copy_artifact))
        .route(
            "/storages/:storage_id/:repository_id/*path",
            get(download).put(upload).delete(delete_artifact),
        )
}

/// Query parameters of the copy operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyParams {
    pub src_storage_id: String,
    pub src_repository_id: String,
    pub dest_storage_id: String,
    pub dest_repository_id: String,
}

/// Query parameters of the delete operation.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub force: bool,
}

/// PUT /storages/{storage}/{repository}/{path} — upload an artifact or a
/// checksum sidecar.
#[utoipa::path(
    put,
    path = "/storages/{storage_id}/{repository_id}/{path}",
    params(
        ("storage_id" = String, Path, description = "Storage id"),
        ("repository_id" = String, Path, description = "Repository id"),
        ("path" = String, Path, description = "Repository-relative artifact path"),
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Stored"),
        (status = 400, description = "Validation rejected the deployment", body = ErrorBody),
        (status = 503, description = "Repository out of service", body = ErrorBody),
    ),
    tag = "artifacts"
)]
pub(crate) async fn upload(
    State(state): State<AppState>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state
        .service
        .store(&storage_id, &repository_id, &path, &mut &body[..])?;
    Ok(StatusCode::OK)
}

/// GET /storages/{storage}/{repository}/{path} — download, honoring
/// single-range `Range` headers.
#[utoipa::path(
    get,
    path = "/storages/{storage_id}/{repository_id}/{path}",
    params(
        ("storage_id" = String, Path, description = "Storage id"),
        ("repository_id" = String, Path, description = "Repository id"),
        ("path" = String, Path, description = "Repository-relative artifact path"),
    ),
    responses(
        (status = 200, description = "Full content"),
        (status = 206, description = "Partial content"),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 416, description = "Range not satisfiable", body = ErrorBody),
        (status = 503, description = "Repository out of service", body = ErrorBody),
    ),
    tag = "artifacts"
)]
pub(crate) async fn download(
    State(state): State<AppState>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let checksum_headers_enabled = state
        .service
        .repository(&storage_id, &repository_id)?
        .checksum_headers_enabled;

    let ranges = headers
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range_header);

    let (status, body, content_range) = match ranges {
        Some(ranges) if ranges.len() == 1 => {
            let stream = state.service.resolve(&storage_id, &repository_id, &path)?;
            let length = stream.len();
            let mut ranged = RangedSource::new(stream, length);
            ranged.set_range(ranges[0])?;

            let mut body = Vec::new();
            ranged.read_to_end(&mut body).map_err(|e| {
                AppError::Internal(format!("reading ranged artifact failed: {e}"))
            })?;
            let content_range = content_range_header(&ranged.current_range(), length);
            (StatusCode::PARTIAL_CONTENT, body, Some(content_range))
        }
        // Multipart range bodies are out of scope; serve the whole file.
        _ => {
            let body = state.service.read(&storage_id, &repository_id, &path)?;
            (StatusCode::OK, body, None)
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(PathClass::of(&path).content_type()),
    );
    if let Some(content_range) = content_range {
        response_headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&content_range)
                .map_err(|e| AppError::Internal(e.to_string()))?,
        );
        response_headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    if checksum_headers_enabled {
        for (header, algorithm) in [
            (&CHECKSUM_MD5, ChecksumAlgorithm::Md5),
            (&CHECKSUM_SHA1, ChecksumAlgorithm::Sha1),
        ] {
            let Some(digest) =
                state
                    .service
                    .checksum_header(&storage_id, &repository_id, &path, algorithm)
            else {
                continue;
            };
            if let Ok(value) = HeaderValue::from_str(&digest) {
                response_headers.insert(header.clone(), value);
            }
        }
    }

    Ok((status, response_headers, Bytes::from(body)).into_response())
}

/// DELETE /storages/{storage}/{repository}/{path}?force= — remove an
/// artifact (or version directory) with its sidecars and metadata entry.
#[utoipa::path(
    delete,
    path = "/storages/{storage_id}/{repository_id}/{path}",
    params(
        ("storage_id" = String, Path, description = "Storage id"),
        ("repository_id" = String, Path, description = "Repository id"),
        ("path" = String, Path, description = "Repository-relative artifact path"),
        ("force" = bool, Query, description = "Bypass the repository trash"),
    ),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Structural rejection", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
    ),
    tag = "artifacts"
)]
pub(crate) async fn delete_artifact(
    State(state): State<AppState>,
    Path((storage_id, repository_id, path)): Path<(String, String, String)>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .delete(&storage_id, &repository_id, &path, params.force)?;
    Ok(StatusCode::OK)
}

/// POST /storages/copy/{path} — server-side copy between repositories.
#[utoipa::path(
    post,
    path = "/storages/copy/{path}",
    params(
        ("path" = String, Path, description = "Repository-relative artifact path"),
        ("srcStorageId" = String, Query, description = "Source storage id"),
        ("srcRepositoryId" = String, Query, description = "Source repository id"),
        ("destStorageId" = String, Query, description = "Destination storage id"),
        ("destRepositoryId" = String, Query, description = "Destination repository id"),
    ),
    responses(
        (status = 200, description = "Copied"),
        (status = 400, description = "Destination rejected the copy", body = ErrorBody),
        (status = 404, description = "A storage, repository, or the source path is missing", body = ErrorBody),
    ),
    tag = "artifacts"
)]
pub(crate) async fn copy_artifact(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<CopyParams>,
) -> Result<StatusCode, AppError> {
    state.service.copy(
        &params.src_storage_id,
        &params.src_repository_id,
        &path,
        &params.dest_storage_id,
        &params.dest_repository_id,
    )?;
    Ok(StatusCode::OK)
}
