//! Request descriptors presented to the interceptor.
//!
//! The engine never parses bodies; it only needs the method, the target used
//! for route matching and headers for custom handlers.

use bytes::Bytes;

/// An outbound request observed before it is sent.
///
/// ```
/// use netcondition::request::InterceptedRequest;
///
/// let req = InterceptedRequest::get("https://bank.test/api/balance?acct=1");
/// assert_eq!(req.target(), "https://bank.test/api/balance");
/// assert_eq!(req.path(), "/api/balance");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptedRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl InterceptedRequest {
    /// Describe a request with the given method and URL or path.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Describe a `GET` request.
    pub fn get(url: impl Into<String>) -> Self { Self::new("GET", url) }

    /// Describe a `POST` request carrying `body`.
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new("POST", url).with_body(body)
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &str { &self.method }

    /// Full URL or path as supplied by the client.
    #[must_use]
    pub fn url(&self) -> &str { &self.url }

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

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// URL without query string or fragment; this is what patterns match.
    #[must_use]
    pub fn target(&self) -> &str {
        self.url
            .find(['?', '#'])
            .map_or(self.url.as_str(), |end| &self.url[..end])
    }

    /// Path component of [`Self::target`], without scheme and authority.
    #[must_use]
    pub fn path(&self) -> &str {
        let target = self.target();
        match target.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |start| &rest[start..]),
            None => target,
        }
    }
}
