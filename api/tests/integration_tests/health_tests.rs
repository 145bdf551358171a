//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint and its store counts
//! - Health probes are not recorded
//! - Empty store behavior

use axum::http::StatusCode;

use super::common::{get, settled_log_count, settled_metric_count, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "sightline-api");
    assert_eq!(response["logs"], 0);
    assert_eq!(response["metrics"], 0);
}

#[tokio::test]
async fn test_health_check_is_not_recorded() {
    let (app, state) = test_app();

    for _ in 0..3 {
        let (status, _) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    // Only the read below gets recorded.
    get(app.clone(), "/logs").await;
    assert_eq!(settled_log_count(&state, 1).await, 1);
    assert_eq!(settled_metric_count(&state, 2).await, 2);

    let (_, response) = get(app, "/health").await;
    assert_eq!(response["logs"], 1);
    assert_eq!(response["metrics"], 2);
}

#[tokio::test]
async fn test_empty_stores_return_empty_results() {
    let (app, _state) = test_app();

    let (status, response) = get(app.clone(), "/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.as_array().unwrap().is_empty());

    let (status, response) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.as_array().unwrap().is_empty());
}
