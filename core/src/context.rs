//! Per-request correlation context.
//!
//! Each logical request runs inside its own task-local mapping of correlation
//! attributes (at minimum `request_id`). Two requests handled concurrently
//! never see each other's mapping, because the mapping lives in the future
//! that serves the request rather than in any shared map.
//!
//! ```
//! use sightline_core::context::RequestContext;
//! use sightline_core::models::AttributeValue;
//!
//! # tokio_test::block_on(async {
//! RequestContext::scope([("request_id".to_string(), AttributeValue::from("r-1"))], async {
//!     RequestContext::update([("user_id".to_string(), AttributeValue::from(42))]);
//!     let context = RequestContext::get();
//!     assert_eq!(context.len(), 2);
//! })
//! .await;
//!
//! assert!(RequestContext::get().is_empty());
//! # });
//! ```

use crate::models::{AttributeValue, Attributes};
use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static ACTIVE_CONTEXT: RefCell<Attributes>;
}

/// Accessors for the context of the request being served.
///
/// All operations are no-ops (or return an empty map) when called outside
/// [`RequestContext::scope`].
#[derive(Debug, Clone, Copy)]
pub struct RequestContext;

impl RequestContext {
    /// Runs `fut` with a fresh context initialised from `initial`.
    pub async fn scope<I, F>(initial: I, fut: F) -> F::Output
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
        F: Future,
    {
        let context: Attributes = initial.into_iter().collect();
        ACTIVE_CONTEXT.scope(RefCell::new(context), fut).await
    }

    /// Wraps a future about to be spawned so it starts with a copy of the
    /// current context. Later changes on either side are not shared.
    pub fn inherit<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let snapshot = Self::get();
        ACTIVE_CONTEXT.scope(RefCell::new(snapshot), fut)
    }

    /// Returns a copy of the current mapping, empty outside a scope.
    #[must_use]
    pub fn get() -> Attributes {
        ACTIVE_CONTEXT
            .try_with(|context| context.borrow().clone())
            .unwrap_or_default()
    }

    /// Returns one attribute of the current mapping.
    #[must_use]
    pub fn value(key: &str) -> Option<AttributeValue> {
        ACTIVE_CONTEXT
            .try_with(|context| context.borrow().get(key).cloned())
            .ok()
            .flatten()
    }

    /// Returns the current `request_id`, if any.
    #[must_use]
    pub fn request_id() -> Option<String> {
        Self::value("request_id").and_then(|value| value.as_str().map(str::to_string))
    }

    /// Merges `partial` into the current mapping; the last write of a key wins.
    pub fn update<I>(partial: I)
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        let _ = ACTIVE_CONTEXT.try_with(|context| context.borrow_mut().extend(partial));
    }

    /// Empties the current mapping. Safe to call repeatedly.
    pub fn clear() {
        let _ = ACTIVE_CONTEXT.try_with(|context| context.borrow_mut().clear());
    }

    /// Returns true when called inside a scope.
    #[must_use]
    pub fn is_active() -> bool {
        ACTIVE_CONTEXT.try_with(|_| ()).is_ok()
    }
}

/// Clears the current context when dropped.
///
/// Create one at the top of a scoped future so the context is emptied on
/// every exit path, including cancellation.
#[derive(Debug, Default)]
pub struct ContextGuard {
    _private: (),
}

impl ContextGuard {
    /// Creates a guard for the current scope.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        RequestContext::clear();
    }
}
