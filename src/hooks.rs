//! Custom route handlers registered in place of a condition profile.
//!
//! A [`RouteHandler`] decides a request itself instead of following the
//! delay-then-forward-or-fail protocol. Handlers run on the request's own
//! task, so a slow handler delays only the request it is deciding.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{request::InterceptedRequest, response::Response};

/// What a custom handler wants done with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerDecision {
    /// Forward the request unmodified.
    Continue,
    /// Forward the request after waiting for the given duration.
    ContinueAfter(Duration),
    /// Return this response without forwarding.
    Fulfill(Response),
    /// Abort the request with the given reason.
    Abort(String),
}

/// Logic deciding requests for a route pattern.
///
/// ```rust
/// use async_trait::async_trait;
/// use netcondition::{
///     hooks::{HandlerDecision, RouteHandler},
///     request::InterceptedRequest,
/// };
///
/// struct BlockWrites;
///
/// #[async_trait]
/// impl RouteHandler for BlockWrites {
///     async fn handle(&self, request: &InterceptedRequest) -> HandlerDecision {
///         if request.method() == "GET" {
///             HandlerDecision::Continue
///         } else {
///             HandlerDecision::Abort("read-only scenario".into())
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    /// Decide what happens to `request`.
    async fn handle(&self, request: &InterceptedRequest) -> HandlerDecision;

    /// Label used in logs and telemetry.
    fn name(&self) -> &str { "handler" }
}

/// Type alias for the synchronous decision callback wrapped by [`FnHandler`].
type DecideFn = Box<dyn Fn(&InterceptedRequest) -> HandlerDecision + Send + Sync + 'static>;

/// [`RouteHandler`] backed by a synchronous closure.
pub struct FnHandler {
    name: String,
    decide: DecideFn,
}

impl FnHandler {
    /// Wrap `decide` as a handler labelled `name`.
    pub fn new<F>(name: impl Into<String>, decide: F) -> Self
    where
        F: Fn(&InterceptedRequest) -> HandlerDecision + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decide: Box::new(decide),
        }
    }

    /// Wrap `decide` and erase it behind an `Arc` ready for registration.
    pub fn shared<F>(name: impl Into<String>, decide: F) -> Arc<dyn RouteHandler>
    where
        F: Fn(&InterceptedRequest) -> HandlerDecision + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, decide))
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl RouteHandler for FnHandler {
    async fn handle(&self, request: &InterceptedRequest) -> HandlerDecision { (self.decide)(request) }

    fn name(&self) -> &str { &self.name }
}
