//! Request and response values exchanged with a transport.

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE, RANGE,
};
use reqwest::{Method, StatusCode};

use crate::cache::{X_CACHED, X_CONTENT_UNCHANGED};
use crate::error::{CacheError, Result};

/// Headers that make a request conditional on the caller's behalf.
const CONDITIONAL_HEADERS: [HeaderName; 5] = [
    IF_MODIFIED_SINCE,
    IF_NONE_MATCH,
    IF_MATCH,
    IF_UNMODIFIED_SINCE,
    IF_RANGE,
];

// == Delivery ==
/// How the caller wants the response body delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Whole body collected in memory
    #[default]
    Buffered,
    /// Body handed to the caller incrementally; never cached
    Streamed,
}

// == Http Request ==
/// An outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub delivery: Delivery,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            delivery: Delivery::Buffered,
        }
    }

    /// Creates a buffered GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the `Range` header, e.g. `bytes=0-99`.
    pub fn with_range(self, range: &str) -> Result<Self> {
        let value = HeaderValue::from_str(range)
            .map_err(|_| CacheError::InvalidRequest(format!("Invalid range: {range}")))?;
        Ok(self.with_header(RANGE, value))
    }

    pub fn streamed(mut self) -> Self {
        self.delivery = Delivery::Streamed;
        self
    }

    /// Returns the `Range` header value, if present and readable.
    pub fn range(&self) -> Option<&str> {
        self.headers.get(RANGE).and_then(|v| v.to_str().ok())
    }

    /// True when the caller already supplied a conditional header.
    pub fn has_conditional_headers(&self) -> bool {
        CONDITIONAL_HEADERS
            .iter()
            .any(|name| self.headers.contains_key(name))
    }

    /// True when a `Range` header is present but not visible ASCII; such a
    /// request can't be given its own cache slot.
    pub fn has_unreadable_range(&self) -> bool {
        self.headers
            .get(RANGE)
            .is_some_and(|v| v.to_str().is_err())
    }

    /// Only buffered GETs without caller validators or an unreadable range
    /// go through the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
            && self.delivery == Delivery::Buffered
            && !self.has_conditional_headers()
            && !self.has_unreadable_range()
    }
}

// == Http Response ==
/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a header as a string, if present and visible ASCII.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Served from the local store.
    pub fn is_cached(&self) -> bool {
        self.header(X_CACHED) == Some("1")
    }

    /// Body identical to the previously stored version.
    pub fn is_content_unchanged(&self) -> bool {
        self.header(X_CONTENT_UNCHANGED) == Some("1")
    }
}
