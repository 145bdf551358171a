//! Metric read-back endpoint.
//!
//! `GET /metrics?since=<ts>` returns stored samples newer than `since`,
//! oldest first.

use super::{storage_failure, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sightline_core::models::MetricSample;
use sightline_core::query::ReadParams;

/// Creates the metrics routes.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(read_metrics))
        .with_state(state)
}

async fn read_metrics(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Json<Vec<MetricSample>>, (StatusCode, Json<ErrorResponse>)> {
    let samples = state
        .metric_store()
        .read(params.since())
        .await
        .map_err(|e| storage_failure(&e))?;
    Ok(Json(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_read_metrics_since() {
        let state = AppState::with_in_memory_store();
        for (name, ts) in [("b", 2.0), ("a", 1.0), ("c", 3.0)] {
            state
                .metric_store()
                .write(MetricSample::counter(name).with_timestamp(ts))
                .await
                .unwrap();
        }

        let response = metrics_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/metrics?since=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let samples: Vec<MetricSample> = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
