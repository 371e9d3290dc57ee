//! Defines routes for one store variant.
//!
//! ## Structure
//! - **Open endpoints**
//!   - `GET    /`       — running message and server time
//!   - `GET    /health` — database connectivity
//!
//! - **Artifact endpoints** (bearer token required when a gate is given)
//!   - `POST   /upload`             — multipart upload, field `file`
//!   - `GET    /{collection}`       — list metadata, newest first
//!   - `GET    /{collection}/{id}`  — raw bytes
//!   - `DELETE /{collection}/{id}`  — delete
//!
//! `{collection}` is `images` or `json-files` depending on the variant.

use crate::{
    handlers::{
        health_handlers::{health, root},
        object_handlers::{delete_object, get_object, list_objects, upload_object},
    },
    services::{
        auth::{BearerGate, require_bearer},
        storage_service::StorageService,
        validation::MAX_UPLOAD_BYTES,
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Room for multipart boundaries and part headers on top of the payload.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the router for the service's variant.
///
/// When `gate` is present every artifact endpoint requires its token; the root
/// and health checks stay open.
pub fn routes(service: StorageService, gate: Option<BearerGate>) -> Router {
    let collection = service.variant.collection_path();

    let mut artifacts: Router<StorageService> = Router::new()
        .route("/upload", post(upload_object))
        .route(collection, get(list_objects))
        .route(
            &format!("{collection}/{{id}}"),
            get(get_object).delete(delete_object),
        );
    if let Some(gate) = gate {
        artifacts = artifacts.route_layer(middleware::from_fn_with_state(gate, require_bearer));
    }

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(artifacts)
        .layer(DefaultBodyLimit::max(
            MAX_UPLOAD_BYTES as usize + MULTIPART_OVERHEAD_BYTES,
        ))
        .with_state(service)
}
