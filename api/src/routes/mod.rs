//! API route definitions.
//!
//! This module organizes all HTTP routes for the Sightline API server.

mod health;
mod logs;
mod metrics;

pub use health::health_routes;
pub use logs::logs_routes;
pub use metrics::metrics_routes;

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sightline_core::storage::StorageError;

/// Error body returned when a read fails.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

pub(crate) fn storage_failure(e: &StorageError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %e, "Storage read failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "storage_error".to_string(),
            message: e.to_string(),
        }),
    )
}
