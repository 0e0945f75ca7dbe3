//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented artifact routes into a single OpenAPI
//! spec served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the artifact surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Citadel Artifact Repository",
        version = "0.3.0",
        description = "Content-addressed artifact repository server.\n\nHosts Maven-style build artifacts with per-artifact MD5/SHA-1 sidecars, per-directory version metadata, byte-range resumable downloads, and virtual group repositories federating ordered member repositories.",
        license(name = "Apache-2.0")
    ),
    servers(
        (url = "http://localhost:48080", description = "Local development server"),
    ),
    paths(
        crate::routes::artifacts::upload,
        crate::routes::artifacts::download,
        crate::routes::artifacts::delete_artifact,
        crate::routes::artifacts::copy_artifact,
    ),
    components(schemas(crate::error::ErrorBody, crate::error::ErrorDetail)),
    tags(
        (name = "artifacts", description = "Artifact upload, download, copy, and delete")
    )
)]
pub struct ApiDoc;

/// Router exposing the generated spec.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
