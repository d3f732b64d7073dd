//! Service abstraction connecting the interceptor to the real destination.
//!
//! The request-executing client supplies the real destination as a
//! [`Service`]. [`Transform`] wraps such a service in another one, which is
//! how [`crate::interceptor::ConditionLayer`] installs fault injection in
//! front of it.

use async_trait::async_trait;

use crate::{request::InterceptedRequest, response::Response};

/// Trait representing an asynchronous service.
#[async_trait]
pub trait Service: Send + Sync {
    /// Error type returned by the service.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle the request and produce a response.
    async fn call(&self, req: InterceptedRequest) -> Result<Response, Self::Error>;
}

#[async_trait]
impl<S> Service for std::sync::Arc<S>
where
    S: Service + ?Sized,
{
    type Error = S::Error;

    async fn call(&self, req: InterceptedRequest) -> Result<Response, Self::Error> {
        (**self).call(req).await
    }
}

/// Factory for wrapping services with middleware.
#[async_trait]
pub trait Transform<S>: Send + Sync
where
    S: Service,
{
    /// Wrapped service produced by the middleware.
    type Output: Service;

    /// Create a new middleware service wrapping `service`.
    async fn transform(&self, service: S) -> Self::Output;
}
