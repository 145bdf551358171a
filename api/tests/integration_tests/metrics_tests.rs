//! Integration tests for metric read-back.
//!
//! Tests cover:
//! - The request counter and duration samples written per request
//! - `since` filter

use axum::http::StatusCode;
use sightline_core::models::MetricSample;

use super::common::{get, settled_metric_count, test_app};

#[tokio::test]
async fn test_each_request_writes_counter_and_duration() {
    let (app, state) = test_app();

    let (status, _) = get(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled_metric_count(&state, 2).await, 2);

    let (_, response) = get(app, "/metrics").await;
    let samples = response.as_array().unwrap();
    assert_eq!(samples.len(), 2);

    let names: Vec<&str> = samples
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"http_requests_total"));
    assert!(names.contains(&"http_request_duration_seconds"));

    for sample in samples {
        assert_eq!(sample["labels"]["method"], "GET");
        assert_eq!(sample["labels"]["path"], "/metrics");
    }
    let counter = samples
        .iter()
        .find(|s| s["name"] == "http_requests_total")
        .unwrap();
    assert_eq!(counter["value"], 1.0);
    assert_eq!(counter["labels"]["status"], "200");
}

#[tokio::test]
async fn test_since_filter() {
    let (app, state) = test_app();
    state
        .metric_store()
        .write(MetricSample::gauge("queue_depth", 3.0).with_timestamp(100.0))
        .await
        .unwrap();
    state
        .metric_store()
        .write(MetricSample::gauge("queue_depth", 5.0).with_timestamp(200.0))
        .await
        .unwrap();

    let (_, response) = get(app, "/metrics?since=100").await;
    let samples = response.as_array().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["value"], 5.0);
}
