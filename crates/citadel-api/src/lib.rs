//! # citadel-api — Axum HTTP Surface
//!
//! The HTTP face of the Citadel artifact repository.
//!
//! | Method | Path | Behavior |
//! |--------|------|----------|
//! | `PUT` | `/storages/{storage}/{repo}/{path}` | Upload artifact or sidecar |
//! | `GET` | `/storages/{storage}/{repo}/{path}` | Download; honors `Range` |
//! | `POST` | `/storages/copy/{path}?srcStorageId&…` | Server-side copy |
//! | `DELETE` | `/storages/{storage}/{repo}/{path}?force=` | Remove artifact |
//!
//! Health probes (`/health/*`) and `/openapi.json` are mounted alongside.
//! Domain errors map onto HTTP statuses in [`error`]; all request handling
//! is traced via `tower_http::trace`.

pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Upload size ceiling. Build artifacts routinely reach hundreds of
/// megabytes; anything larger than this is refused outright.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::artifacts::router())
        .merge(openapi::router())
        .route("/health/liveness", get(|| async { "ok" }))
        .route("/health/readiness", get(|| async { "ready" }))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
