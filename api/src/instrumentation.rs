//! Axum adapter for the request instrumentation middleware.
//!
//! Each request is buffered into an [`HttpRequest`] and handed to the
//! middleware on its own task, with the rest of the router stack as the
//! wrapped [`Handler`]. The response is returned as soon as the handler
//! starts it and its body streams through a channel, so recording the
//! exchange happens after the client already has what it asked for.

use crate::state::AppState;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};
use http_body_util::BodyExt;
use sightline_core::context::RequestContext;
use sightline_core::middleware::{
    Handler, HandlerError, HttpRequest, Signal, SignalSink, WorkItem,
};
use std::convert::Infallible;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Signals buffered between the handler task and the response body.
const SIGNAL_BUFFER: usize = 16;

/// Runs the request through the instrumentation middleware.
///
/// Install with [`axum::middleware::from_fn_with_state`].
pub async fn instrument(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let work = HttpRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        headers: parts.headers.clone(),
        body: body.to_vec(),
    };
    let downstream = Downstream {
        pending: Mutex::new(Some((Request::from_parts(parts, Body::from(body)), next))),
    };

    let (tx, mut rx) = mpsc::channel(SIGNAL_BUFFER);
    tokio::spawn(RequestContext::inherit(async move {
        let mut sink = ChannelSink(tx);
        if let Err(e) = state
            .middleware()
            .handle(WorkItem::Http(work), &mut sink, &downstream)
            .await
        {
            tracing::error!(error = %e.describe(), "Instrumented request failed");
        }
    }));

    loop {
        match rx.recv().await {
            Some(Signal::Start { status, headers }) => {
                return streamed_response(status, headers, rx);
            }
            Some(Signal::Body { .. }) => {
                tracing::warn!("Dropping body chunk sent before the response started");
            }
            None => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Forwards signals to the response being streamed to the client.
struct ChannelSink(mpsc::Sender<Signal>);

#[async_trait]
impl SignalSink for ChannelSink {
    async fn send(&mut self, signal: Signal) -> Result<(), HandlerError> {
        self.0
            .send(signal)
            .await
            .map_err(|_| HandlerError::new("ResponseDropped", "client stopped reading the response"))
    }
}

/// The remainder of the axum stack, runnable once.
struct Downstream {
    pending: Mutex<Option<(Request, Next)>>,
}

#[async_trait]
impl Handler for Downstream {
    async fn handle(&self, _item: WorkItem, sink: &mut dyn SignalSink) -> Result<(), HandlerError> {
        let pending = self
            .pending
            .lock()
            .map_err(|_| HandlerError::new("LockError", "downstream lock poisoned"))?
            .take();
        let Some((request, next)) = pending else {
            return Err(HandlerError::new(
                "HandlerReused",
                "downstream handler already ran",
            ));
        };

        let (parts, mut body) = next.run(request).await.into_parts();
        sink.send(Signal::Start {
            status: parts.status.as_u16(),
            headers: parts.headers,
        })
        .await?;

        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame?.into_data() {
                sink.send(Signal::Body {
                    chunk: data.to_vec(),
                    more: true,
                })
                .await?;
            }
        }
        sink.send(Signal::body(Vec::new())).await
    }
}

fn streamed_response(status: u16, headers: HeaderMap, rx: mpsc::Receiver<Signal>) -> Response {
    let mut response = Response::new(Body::from_stream(body_chunks(rx)));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    *response.headers_mut() = headers;
    response
}

/// Body chunks up to and including the final one. The stream ends there even
/// though the sender stays open while the exchange is recorded.
fn body_chunks(rx: mpsc::Receiver<Signal>) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        loop {
            match rx.recv().await? {
                Signal::Body { chunk, more } => {
                    return Some((Ok::<_, Infallible>(Bytes::from(chunk)), more.then_some(rx)));
                }
                Signal::Start { .. } => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use std::time::Duration;

    #[tokio::test]
    async fn test_response_streams_chunks_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());

        tx.send(Signal::Body {
            chunk: b"hello ".to_vec(),
            more: true,
        })
        .await
        .unwrap();
        tx.send(Signal::body("world")).await.unwrap();
        drop(tx);

        let response = streamed_response(201, headers, rx);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_body_ends_at_final_chunk_while_sender_is_open() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Signal::Body {
            chunk: b"ab".to_vec(),
            more: true,
        })
        .await
        .unwrap();
        tx.send(Signal::body("c")).await.unwrap();

        let response = streamed_response(200, HeaderMap::new(), rx);
        let body = tokio::time::timeout(Duration::from_secs(1), response.into_body().collect())
            .await
            .expect("body did not finish while the sender was open")
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"abc");
        drop(tx);
    }

    #[tokio::test]
    async fn test_invalid_status_becomes_server_error() {
        let (_tx, rx) = mpsc::channel(1);
        let response = streamed_response(42, HeaderMap::new(), rx);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
