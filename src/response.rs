//! Responses returned to the request-executing client.
//!
//! Every outcome that is not an engine fault is an ordinary [`Response`]. The
//! [`ResponseOrigin`] records who produced it so callers and telemetry can
//! tell an injected failure apart from a genuine downstream failure.

use bytes::Bytes;

use crate::{error::ForwardError, profile::FailureResponse};

/// Status used when the real downstream call fails.
pub const FORWARD_ERROR_STATUS: u16 = 502;

/// Producer of a [`Response`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseOrigin {
    /// The real destination answered.
    Upstream,
    /// The engine substituted the profile's failure response.
    Injected,
    /// The real destination could not be reached or failed on its own.
    ForwardError,
    /// A custom route handler fulfilled the request.
    Handler,
}

impl ResponseOrigin {
    /// Stable label used in logs and telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Injected => "injected",
            Self::ForwardError => "forward_error",
            Self::Handler => "handler",
        }
    }
}

/// A response with status, headers, body and origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    origin: ResponseOrigin,
}

impl Response {
    /// Response produced by the real destination.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self::with_origin(status, body, ResponseOrigin::Upstream)
    }

    /// Response with an explicit origin.
    pub fn with_origin(status: u16, body: impl Into<Bytes>, origin: ResponseOrigin) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            origin,
        }
    }

    /// Synthesised response for an injected failure.
    #[must_use]
    pub fn injected(failure: &FailureResponse) -> Self {
        Self::with_origin(failure.status(), failure.body().clone(), ResponseOrigin::Injected)
            .with_header("content-type", "application/json")
    }

    /// Gateway response standing in for a failed forward.
    #[must_use]
    pub fn forward_error(error: &ForwardError) -> Self {
        let body = serde_json::json!({
            "error": "upstream unavailable",
            "detail": error.upstream().to_string(),
        });
        Self::with_origin(
            FORWARD_ERROR_STATUS,
            body.to_string(),
            ResponseOrigin::ForwardError,
        )
        .with_header("content-type", "application/json")
    }

    /// Mark a handler-supplied response as fulfilled by the handler.
    #[must_use]
    pub(crate) fn from_handler(mut self) -> Self {
        self.origin = ResponseOrigin::Handler;
        self
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 { self.status }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool { self.status >= 200 && self.status < 300 }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// First header called `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// Who produced the response.
    #[must_use]
    pub const fn origin(&self) -> ResponseOrigin { self.origin }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn forward_error_is_a_gateway_response() {
        let err = ForwardError::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        let response = Response::forward_error(&err);
        assert_eq!(response.status(), FORWARD_ERROR_STATUS);
        assert_eq!(response.origin(), ResponseOrigin::ForwardError);
        let body: serde_json::Value =
            serde_json::from_slice(response.body()).expect("body is JSON");
        assert_eq!(body["detail"], "refused");
    }

    #[test]
    fn injected_response_copies_failure_payload() {
        let failure = FailureResponse::default();
        let response = Response::injected(&failure);
        assert_eq!(response.status(), 503);
        assert_eq!(response.body(), failure.body());
        assert_eq!(response.origin(), ResponseOrigin::Injected);
        assert!(!response.is_success());
    }
}
