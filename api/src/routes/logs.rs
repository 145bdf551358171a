//! Log read-back endpoint.
//!
//! `GET /logs?since=<ts>&level=<level>` returns the stored entries newer than
//! `since`, oldest first. Malformed filters fall back to "no filter".

use super::{storage_failure, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sightline_core::models::LogEntry;
use sightline_core::query::ReadParams;

/// Creates the log routes.
pub fn logs_routes(state: AppState) -> Router {
    Router::new()
        .route("/logs", get(read_logs))
        .with_state(state)
}

async fn read_logs(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Json<Vec<LogEntry>>, (StatusCode, Json<ErrorResponse>)> {
    let query = params.log_query();
    let logs = state
        .log_store()
        .read(query)
        .await
        .map_err(|e| storage_failure(&e))?;

    tracing::debug!(
        since = query.since,
        level = ?query.level,
        count = logs.len(),
        "Read logs"
    );
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sightline_core::models::LogLevel;
    use tower::ServiceExt;

    async fn seeded_state() -> AppState {
        let state = AppState::with_in_memory_store();
        let store = state.log_store();
        store
            .write(LogEntry::new(LogLevel::Error, "third").with_timestamp(30.0))
            .await
            .unwrap();
        store
            .write(LogEntry::new(LogLevel::Info, "first").with_timestamp(10.0))
            .await
            .unwrap();
        store
            .write(LogEntry::new(LogLevel::Info, "second").with_timestamp(20.0))
            .await
            .unwrap();
        state
    }

    async fn fetch(state: AppState, uri: &str) -> Vec<LogEntry> {
        let response = logs_routes(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn messages(logs: &[LogEntry]) -> Vec<&str> {
        logs.iter().map(|l| l.message.as_str()).collect()
    }

    #[tokio::test]
    async fn test_read_all_in_timestamp_order() {
        let logs = fetch(seeded_state().await, "/logs").await;
        assert_eq!(messages(&logs), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_since_is_exclusive() {
        let logs = fetch(seeded_state().await, "/logs?since=20").await;
        assert_eq!(messages(&logs), vec!["third"]);
    }

    #[tokio::test]
    async fn test_level_filter_is_case_insensitive() {
        let logs = fetch(seeded_state().await, "/logs?level=ERROR").await;
        assert_eq!(messages(&logs), vec!["third"]);
    }

    #[tokio::test]
    async fn test_malformed_filters_are_ignored() {
        let logs = fetch(seeded_state().await, "/logs?since=yesterday&level=chatty").await;
        assert_eq!(logs.len(), 3);

        let logs = fetch(seeded_state().await, "/logs?since=-5").await;
        assert_eq!(logs.len(), 3);
    }

    #[tokio::test]
    async fn test_negative_since_keeps_pre_epoch_records() {
        let state = seeded_state().await;
        state
            .log_store()
            .write(LogEntry::info("before epoch").with_timestamp(-2.0))
            .await
            .unwrap();

        let logs = fetch(state.clone(), "/logs?since=-5").await;
        assert_eq!(messages(&logs)[0], "before epoch");
        assert_eq!(logs.len(), 4);

        let logs = fetch(state, "/logs?since=-2").await;
        assert_eq!(logs.len(), 3);
    }
}
