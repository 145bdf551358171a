//! Framework-neutral request/response exchange.
//!
//! Web framework adapters translate their own request into a [`WorkItem`],
//! call a [`Handler`], and turn the [`Signal`]s it emits back into a response.

use async_trait::async_trait;
use http::{HeaderMap, Method};
use std::error::Error;
use std::fmt;

/// A unit of work delivered to a handler.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// An HTTP request.
    Http(HttpRequest),
    /// A lifecycle or control message that carries no request.
    Control(ControlSignal),
}

/// Lifecycle messages passed through untouched by instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The application is starting.
    Startup,
    /// The application is shutting down.
    Shutdown,
}

/// An inbound HTTP request with a buffered body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl From<HttpRequest> for WorkItem {
    fn from(request: HttpRequest) -> Self {
        Self::Http(request)
    }
}

/// An outgoing response signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Starts the response.
    Start {
        /// HTTP status code.
        status: u16,
        /// Response headers.
        headers: HeaderMap,
    },
    /// A chunk of the response body.
    Body {
        /// Body bytes.
        chunk: Vec<u8>,
        /// Whether more chunks follow.
        more: bool,
    },
}

impl Signal {
    /// A `Start` signal with no headers.
    #[must_use]
    pub fn start(status: u16) -> Self {
        Self::Start {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// A final body chunk.
    #[must_use]
    pub fn body(chunk: impl Into<Vec<u8>>) -> Self {
        Self::Body {
            chunk: chunk.into(),
            more: false,
        }
    }
}

/// Receives the signals a handler emits.
#[async_trait]
pub trait SignalSink: Send {
    /// Delivers one signal to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller can no longer receive signals.
    async fn send(&mut self, signal: Signal) -> Result<(), HandlerError>;
}

#[async_trait]
impl SignalSink for Vec<Signal> {
    async fn send(&mut self, signal: Signal) -> Result<(), HandlerError> {
        self.push(signal);
        Ok(())
    }
}

/// A request handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles one work item, emitting response signals into `sink`.
    ///
    /// # Errors
    ///
    /// Returns the application's error unchanged.
    async fn handle(&self, item: WorkItem, sink: &mut dyn SignalSink) -> Result<(), HandlerError>;
}

/// An error raised by a handler.
///
/// Keeps the short type name of the original error so it can be reported as
/// `"<Type>: <message>"`.
pub struct HandlerError {
    kind: String,
    source: Box<dyn Error + Send + Sync>,
}

impl HandlerError {
    /// Creates an error with an explicit kind.
    pub fn new(kind: impl Into<String>, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
        }
    }

    /// Short type name of the wrapped error.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The wrapped error.
    #[must_use]
    pub fn source(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Consumes the wrapper and returns the wrapped error.
    #[must_use]
    pub fn into_source(self) -> Box<dyn Error + Send + Sync> {
        self.source
    }

    /// Renders `"<Type>: <message>"`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}: {}", self.kind, self.source)
    }
}

fn short_type_name<E>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

impl<E> From<E> for HandlerError
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self {
            kind: short_type_name::<E>(),
            source: Box::new(error),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}
