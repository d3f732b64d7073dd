//! Upstream services standing in for the real destination.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use netcondition::{middleware::Service, request::InterceptedRequest, response::Response};

/// Upstream answering every request with the same response.
///
/// Clones share the call counter and request log.
#[derive(Clone, Debug)]
pub struct StaticUpstream {
    status: u16,
    body: Bytes,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<InterceptedRequest>>>,
}

impl StaticUpstream {
    /// Answer `200` with a small JSON body.
    pub fn ok() -> Self { Self::with_status(200, r#"{"ok":true}"#) }

    /// Answer with `status` and `body`.
    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of requests that reached this upstream.
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Requests that reached this upstream, in arrival order.
    pub fn requests(&self) -> Vec<InterceptedRequest> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Service for StaticUpstream {
    type Error = io::Error;

    async fn call(&self, req: InterceptedRequest) -> Result<Response, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);
        Ok(Response::new(self.status, self.body.clone()))
    }
}

/// Upstream that refuses every connection.
#[derive(Clone, Debug, Default)]
pub struct UnreachableUpstream {
    calls: Arc<AtomicUsize>,
}

impl UnreachableUpstream {
    pub fn new() -> Self { Self::default() }

    /// Number of forwarding attempts.
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Service for UnreachableUpstream {
    type Error = io::Error;

    async fn call(&self, _req: InterceptedRequest) -> Result<Response, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "destination unreachable",
        ))
    }
}
