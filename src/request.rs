//! The request description produced for each invocation of a service method.

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

/// An encoded request body together with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    /// The `Content-Type` of the body.
    pub content_type: &'static str,

    /// The encoded body.
    pub bytes: Bytes,
}

impl RequestBody {
    /// Creates a new body.
    pub fn new(content_type: &'static str, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            bytes: bytes.into(),
        }
    }
}

/// A fully resolved HTTP request, ready to hand to a [`Transport`](crate::Transport).
///
/// This is what a call factory receives: the method, the absolute URL (base URL plus
/// the resolved path template and query), the headers and the optional encoded body.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The absolute request URL.
    pub url: Url,

    /// Headers for this request.
    pub headers: HeaderMap,

    /// The encoded body, if any.
    pub body: Option<RequestBody>,
}

impl RawRequest {
    /// Creates a new `RawRequest` with the given method and URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Adds a query parameter to the request URL.
    pub fn with_query_param(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.url
            .query_pairs_mut()
            .append_pair(key.as_ref(), value.as_ref());
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}
