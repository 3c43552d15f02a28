//! Responses as delivered by a transport and as seen by callers.
//!
//! [`RawResponse`] is the undecoded result of executing a [`RawRequest`](crate::RawRequest).
//! [`Response`] wraps the converted body together with the metadata of the exchange, so
//! callers of [`Call`](crate::Call) can still reach the status, headers, raw body and
//! latency.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// An undecoded HTTP response returned by a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The full response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a new `RawResponse`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A wrapper around a successful HTTP response.
///
/// # Type Parameters
///
/// * `T` - The type of the converted response data
///
/// # Examples
///
/// ```
/// # use retrofit_reqwest::Response;
/// # use http::{HeaderMap, StatusCode};
/// # use std::time::Duration;
/// let response = Response::new(
///     42,
///     "42".to_string(),
///     StatusCode::OK,
///     HeaderMap::new(),
///     Duration::from_millis(100),
/// );
///
/// assert_eq!(*response, 42);
/// assert_eq!(response.raw_body, "42");
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The converted response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from handing the request to the transport until the body was received.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use retrofit_reqwest::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Consumes the response and returns only the converted data.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use retrofit_reqwest::Response;
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("text/plain"));
    ///
    /// let response = Response::new(
    ///     (),
    ///     String::new(),
    ///     StatusCode::OK,
    ///     headers,
    ///     Duration::from_millis(100),
    /// );
    ///
    /// assert_eq!(response.header("content-type").unwrap(), "text/plain");
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
