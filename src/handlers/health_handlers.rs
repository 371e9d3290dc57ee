//! Root & health handlers. Neither requires authorization.
//!
//! - GET /        -> current time and a running message
//! - GET /health  -> database connectivity, always HTTP 200

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
pub struct RootResponse {
    time: DateTime<Utc>,
    message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// `GET /`
pub async fn root(State(service): State<StorageService>) -> Json<RootResponse> {
    Json(RootResponse {
        time: Utc::now(),
        message: format!("{} is running", service.variant.api_title()),
    })
}

/// `GET /health`
///
/// Runs `SELECT 1`. A failure is reported in the body as a degraded status,
/// not as an HTTP error, and the driver message stays in the log.
pub async fn health(State(service): State<StorageService>) -> Json<HealthResponse> {
    match service.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "healthy",
            database: "connected",
        }),
        Err(err) => {
            warn!("health check failed: {}", err);
            Json(HealthResponse {
                status: "unhealthy",
                database: "disconnected",
            })
        }
    }
}
