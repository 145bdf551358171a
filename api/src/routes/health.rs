//! Store health endpoint.
//!
//! `GET /health` reports whether both stores answer and how many records they
//! hold. A store that fails to count turns the report `degraded` with a 503 so
//! load balancers stop routing here.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

/// Health report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Stored log entries, absent when the log store failed.
    pub logs: Option<u64>,
    /// Stored metric samples, absent when the metric store failed.
    pub metrics: Option<u64>,
    /// Failures reported by the stores.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (logs, metrics) = tokio::join!(state.log_store().count(), state.metric_store().count());

    let mut errors = Vec::new();
    let logs = logs
        .map_err(|e| errors.push(format!("log store: {e}")))
        .ok();
    let metrics = metrics
        .map_err(|e| errors.push(format!("metric store: {e}")))
        .ok();

    let (code, status) = if errors.is_empty() {
        (StatusCode::OK, "healthy")
    } else {
        tracing::warn!(errors = ?errors, "Health check degraded");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: "sightline-api",
            version: env!("CARGO_PKG_VERSION"),
            logs,
            metrics,
            errors,
        }),
    )
}
