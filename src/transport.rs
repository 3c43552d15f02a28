//! The asynchronous HTTP transport that every call is executed on.
//!
//! [`Transport`] is the only contract this crate needs from an HTTP client: execute a
//! [`RawRequest`] and eventually deliver a [`RawResponse`] or a failure. Cancellation is
//! expressed the way async Rust expresses it: dropping the future returned by
//! [`Transport::execute`] must abort the in-flight request.
//!
//! [`ReqwestTransport`] is the default implementation.

use crate::{Error, RawRequest, RawResponse, Result};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

/// An asynchronous HTTP client able to execute request descriptions.
///
/// Implementations must abort the underlying request when the returned future is
/// dropped before completion. Non-2xx statuses are not failures at this level; they are
/// delivered as ordinary [`RawResponse`]s.
///
/// # Examples
///
/// A canned transport, useful in tests:
///
/// ```
/// use retrofit_reqwest::{RawRequest, RawResponse, Result, Transport};
/// use http::{HeaderMap, StatusCode};
///
/// struct Canned(&'static str);
///
/// #[async_trait::async_trait]
/// impl Transport for Canned {
///     async fn execute(&self, _request: RawRequest) -> Result<RawResponse> {
///         Ok(RawResponse::new(StatusCode::OK, HeaderMap::new(), self.0))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes the request and delivers the response or the failure.
    async fn execute(&self, request: RawRequest) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse> {
        (**self).execute(request).await
    }
}

/// A [`Transport`] backed by [`reqwest::Client`].
///
/// The transport is cheap to clone and shares its connection pool between clones.
///
/// # Examples
///
/// ```
/// use retrofit_reqwest::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), retrofit_reqwest::Error> {
/// let transport = ReqwestTransport::builder()
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport over a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a new [`ReqwestTransportBuilder`].
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Wraps an externally configured `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse> {
        let RawRequest {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::debug!(
            method = %method,
            url = %url,
            "Executing HTTP request"
        );

        let mut builder = self.http_client.request(method, url);

        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                builder = builder.header(name, value);
            }
        }

        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = body {
            if !headers.contains_key(CONTENT_TYPE) {
                builder = builder.header(CONTENT_TYPE, body.content_type);
            }
            builder = builder.body(body.bytes);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse::new(status, headers, body))
    }
}

/// Builder for configuring and creating a [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ReqwestTransportBuilder {
    /// Creates a new `ReqwestTransportBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// A header of the same name set on an individual request takes precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Transport(format!("Invalid header name: {}", e).into()))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Transport(format!("Invalid header value: {}", e).into()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `ReqwestTransport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be initialized.
    pub fn build(self) -> Result<ReqwestTransport> {
        let http_client = reqwest::Client::builder().build()?;

        Ok(ReqwestTransport {
            http_client,
            default_headers: self.default_headers,
            timeout: self.timeout,
        })
    }
}
