//! Request instrumentation middleware.
//!
//! - [`exchange`] - framework-neutral request, response signal, and handler types
//! - [`config`] - mutable instrumentation settings
//! - [`instrument`] - the middleware itself

pub mod config;
pub mod exchange;
pub mod instrument;

pub use config::MiddlewareConfig;
pub use exchange::{
    ControlSignal, Handler, HandlerError, HttpRequest, Signal, SignalSink, WorkItem,
};
pub use instrument::{InstrumentationMiddleware, Instrumented};
