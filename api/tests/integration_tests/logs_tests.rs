//! Integration tests for log read-back.
//!
//! Tests cover:
//! - Reading logs the instrumentation wrote for earlier requests
//! - `since` and `level` filters
//! - Logs written directly to the store

use axum::http::StatusCode;
use sightline_core::models::{LogEntry, LogLevel};

use super::common::{get, settled_log_count, test_app};

#[tokio::test]
async fn test_read_returns_request_logs_of_earlier_requests() {
    let (app, state) = test_app();

    // The first read sees nothing; its own log is written after it responds.
    let (status, response) = get(app.clone(), "/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.as_array().unwrap().is_empty());
    assert_eq!(settled_log_count(&state, 1).await, 1);

    let (_, response) = get(app, "/logs").await;
    let logs = response.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["level"], "INFO");
    assert_eq!(logs[0]["message"], "GET /logs");
    assert_eq!(logs[0]["attributes"]["path"], "/logs");
    assert_eq!(logs[0]["attributes"]["status_code"], 200);
}

#[tokio::test]
async fn test_level_filter() {
    let (app, state) = test_app();
    state
        .log_store()
        .write(LogEntry::new(LogLevel::Warn, "disk almost full").with_timestamp(1.0))
        .await
        .unwrap();
    state
        .log_store()
        .write(LogEntry::new(LogLevel::Critical, "disk full").with_timestamp(2.0))
        .await
        .unwrap();

    let (status, response) = get(app.clone(), "/logs?level=critical").await;
    assert_eq!(status, StatusCode::OK);
    let logs = response.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "disk full");
    assert_eq!(settled_log_count(&state, 3).await, 3);

    // Unknown level means no filter: both seeded entries plus the request above.
    let (_, response) = get(app, "/logs?level=shouting").await;
    assert_eq!(response.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_since_filter_is_strict() {
    let (app, state) = test_app();
    for ts in [10.0, 20.0, 30.0] {
        state
            .log_store()
            .write(LogEntry::info(format!("at {ts}")).with_timestamp(ts))
            .await
            .unwrap();
    }

    let (_, response) = get(app.clone(), "/logs?since=20").await;
    let logs = response.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "at 30");
    assert_eq!(settled_log_count(&state, 4).await, 4);

    let (_, response) = get(app, "/logs?since=NaN").await;
    // 3 seeded + 1 recorded request
    assert_eq!(response.as_array().unwrap().len(), 4);
}
