//! Integration tests for request instrumentation through the router.
//!
//! Tests cover:
//! - Request id propagation from the correlation header
//! - Status-to-level mapping for unmatched routes
//! - Runtime configuration changes
//! - Concurrent requests keeping their own request ids
//! - Store failures and slow stores never affecting the response

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sightline_api::{create_router, AppState, Config};
use sightline_core::models::{AttributeValue, LogEntry, LogLevel};
use sightline_core::storage::{InMemoryMetricStore, LogQuery, LogStore, StorageError};
use std::sync::Arc;
use std::time::Duration;

use super::common::{get, send, settled_log_count, settled_metric_count, test_app};

/// Log store that rejects every write.
struct FullDisk;

#[async_trait]
impl LogStore for FullDisk {
    async fn write(&self, _entry: LogEntry) -> Result<(), StorageError> {
        Err(StorageError::StorageError("disk full".to_string()))
    }

    async fn read(&self, _query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn delete_before(&self, _timestamp: f64) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn delete_oldest(&self, _count: u64) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Log store whose writes take two seconds.
struct SlowDisk;

#[async_trait]
impl LogStore for SlowDisk {
    async fn write(&self, _entry: LogEntry) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn read(&self, _query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn delete_before(&self, _timestamp: f64) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn delete_oldest(&self, _count: u64) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn app_with_log_store(logs: Arc<dyn LogStore>) -> axum::Router {
    let state = AppState::new(
        logs,
        InMemoryMetricStore::new_shared(),
        Config::default().middleware,
    );
    create_router(state)
}

fn request_with_id(uri: &str, request_id: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-request-id", request_id)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_request_id_header_is_recorded() {
    let (app, state) = test_app();

    let (status, _) = send(app, request_with_id("/metrics", "req-42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled_log_count(&state, 1).await, 1);

    let logs = state.log_store().read(LogQuery::new()).await.unwrap();
    assert_eq!(
        logs[0].attribute("request_id"),
        Some(&AttributeValue::from("req-42"))
    );
}

#[tokio::test]
async fn test_missing_request_id_is_generated() {
    let (app, state) = test_app();

    get(app.clone(), "/logs").await;
    get(app, "/logs").await;
    assert_eq!(settled_log_count(&state, 2).await, 2);

    let logs = state.log_store().read(LogQuery::new()).await.unwrap();
    let ids: Vec<&str> = logs
        .iter()
        .filter_map(|l| l.attribute("request_id").and_then(AttributeValue::as_str))
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| id.len() == 36));
}

#[tokio::test]
async fn test_not_found_is_logged_as_warning() {
    let (app, state) = test_app();

    let (status, _) = get(app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(settled_log_count(&state, 1).await, 1);

    let logs = state
        .log_store()
        .read(LogQuery::new().with_level(LogLevel::Warn))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(
        logs[0].attribute("status_code"),
        Some(&AttributeValue::from(404_u16))
    );
}

#[tokio::test]
async fn test_config_changes_apply_to_later_requests() {
    let (app, state) = test_app();

    state
        .middleware()
        .update_config(|config| config.exclude_paths.push("/metrics".to_string()));
    get(app.clone(), "/metrics").await;

    state.middleware().update_config(|config| config.log_requests = false);
    get(app, "/logs").await;
    assert_eq!(settled_metric_count(&state, 2).await, 2);
    assert_eq!(state.log_store().count().await.unwrap(), 0);

    let samples = state.metric_store().scrape().await.unwrap();
    assert!(samples.iter().all(|s| s.labels["path"] == "/logs"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_ids() {
    let (app, state) = test_app();

    let requests = (0..20).map(|i| {
        let app = app.clone();
        tokio::spawn(async move { send(app, request_with_id("/metrics", &format!("req-{i}"))).await })
    });
    for request in requests.collect::<Vec<_>>() {
        let (status, _) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(settled_log_count(&state, 20).await, 20);
    let logs = state.log_store().read(LogQuery::new()).await.unwrap();
    let mut ids: Vec<String> = logs
        .iter()
        .filter_map(|l| l.attribute("request_id").and_then(AttributeValue::as_str))
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn test_failing_log_store_still_returns_the_response() {
    let app = app_with_log_store(Arc::new(FullDisk));

    let (status, response) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.is_array());
}

#[tokio::test]
async fn test_slow_log_store_does_not_delay_the_response() {
    let app = app_with_log_store(Arc::new(SlowDisk));
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();

    let body = tokio::time::timeout(Duration::from_millis(500), async {
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.into_body().collect().await.unwrap().to_bytes()
    })
    .await
    .expect("response waited on the log store");
    assert_eq!(&body[..], b"[]");
}
