//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sightline_api::{create_router, AppState};
use std::time::Duration;

/// Creates a test router with fresh in-memory stores.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::with_in_memory_store();
    let router = create_router(state.clone());
    (router, state)
}

/// Sends a request and returns the status and parsed JSON body.
///
/// Bodies that are not JSON come back as `Value::Null`.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
///
/// # Arguments
///
/// * `app` - The Axum router to send the request to
/// * `uri` - The URI path to GET from
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Waits until the log store holds `expected` entries and returns the count.
///
/// Requests are recorded after their response is sent, so assertions on the
/// stores have to wait for the recording task.
pub async fn settled_log_count(state: &AppState, expected: u64) -> u64 {
    let mut count = 0;
    for _ in 0..400 {
        count = state.log_store().count().await.unwrap();
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    count
}

/// Waits until the metric store holds `expected` samples and returns the count.
pub async fn settled_metric_count(state: &AppState, expected: u64) -> u64 {
    let mut count = 0;
    for _ in 0..400 {
        count = state.metric_store().count().await.unwrap();
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    count
}
