//! The entry point binding service clients to a transport.
//!
//! [`ClientBuilder`] needs a [`Transport`] and a base URI. Its terminal methods
//! assemble a [`RetrofitBuilder`] pre-populated with a call factory bound to the
//! transport, the [`DeferredCallAdapterFactory`] and the scalars converter, run the
//! user's [`configure`](ClientBuilder::configure) callback against it and finalize
//! the factory.

use crate::adapter::DeferredCallAdapterFactory;
use crate::call::TransportCallFactory;
use crate::converter::ScalarsConverterFactory;
use crate::error::BoxError;
use crate::retrofit::{Retrofit, RetrofitBuilder};
use crate::service::Service;
use crate::{Error, Result, Transport};
use std::fmt;
use std::sync::Arc;
use url::Url;

type ConfigureFn =
    dyn Fn(&mut RetrofitBuilder) -> std::result::Result<(), BoxError> + Send + Sync + 'static;

fn noop(_: &mut RetrofitBuilder) -> std::result::Result<(), BoxError> {
    Ok(())
}

/// Values accepted as a base URI.
pub trait IntoBaseUri {
    /// Parses or converts the value into a URL.
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError>;
}

impl IntoBaseUri for Url {
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError> {
        Ok(self)
    }
}

impl IntoBaseUri for &Url {
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError> {
        Ok(self.clone())
    }
}

impl IntoBaseUri for &str {
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError> {
        Url::parse(self)
    }
}

impl IntoBaseUri for String {
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError> {
        Url::parse(&self)
    }
}

impl IntoBaseUri for &String {
    fn into_base_uri(self) -> std::result::Result<Url, url::ParseError> {
        Url::parse(self)
    }
}

/// Creates a [`ClientBuilder`] executing requests on `transport`.
///
/// # Examples
///
/// ```no_run
/// use retrofit_reqwest::ReqwestTransport;
///
/// # fn example() -> Result<(), retrofit_reqwest::Error> {
/// let retrofit = retrofit_reqwest::builder(ReqwestTransport::new()?)
///     .uri("https://api.example.com")
///     .retrofit()?;
/// # Ok(())
/// # }
/// ```
pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
    ClientBuilder::new().transport(transport)
}

/// Accumulates the configuration needed to create service clients.
///
/// Setters never fail; every problem is reported by the terminal methods
/// [`retrofit`](Self::retrofit) and [`build`](Self::build), which may be called any
/// number of times and produce independent factories.
///
/// # Examples
///
/// ```no_run
/// use retrofit_reqwest::{ClientBuilder, JsonConverterFactory, ReqwestTransport};
///
/// # fn example() -> Result<(), retrofit_reqwest::Error> {
/// let retrofit = ClientBuilder::new()
///     .transport(ReqwestTransport::new()?)
///     .uri("https://api.example.com")
///     .configure(|builder| {
///         builder.add_converter_factory(JsonConverterFactory::create());
///         Ok(())
///     })
///     .retrofit()?;
///
/// assert_eq!(retrofit.base_url().as_str(), "https://api.example.com/");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    uri: Option<std::result::Result<Url, url::ParseError>>,
    configure: Arc<ConfigureFn>,
}

impl ClientBuilder {
    /// Creates a builder with no transport, no base URI and a no-op callback.
    pub fn new() -> Self {
        Self {
            transport: None,
            uri: None,
            configure: Arc::new(noop),
        }
    }

    /// Sets the transport every request is executed on.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport that is already shared.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the base URI for every service created from this builder.
    ///
    /// Strings are parsed immediately; a parse failure is kept and reported as
    /// [`Error::InvalidUri`] by the terminal methods.
    pub fn uri(mut self, uri: impl IntoBaseUri) -> Self {
        self.uri = Some(uri.into_base_uri());
        self
    }

    /// Sets a callback run against the [`RetrofitBuilder`] right before it is built.
    ///
    /// Replaces any previous callback. An error returned by the callback is reported
    /// as [`Error::Configure`] and no factory is produced.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut RetrofitBuilder) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.configure = Arc::new(configure);
        self
    }

    /// Builds the factory.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUri`] if the base URI string could not be parsed.
    /// - [`Error::MissingField`] naming `transport` or `uri` if either was never set.
    /// - [`Error::Configure`] if the configure callback failed.
    /// - [`Error::InvalidBaseUrl`] if the base URI cannot resolve request paths.
    pub fn retrofit(&self) -> Result<Retrofit> {
        if let Some(Err(e)) = &self.uri {
            return Err(Error::InvalidUri(*e));
        }

        let transport = self
            .transport
            .clone()
            .ok_or(Error::MissingField { field: "transport" })?;

        let uri = match &self.uri {
            Some(Ok(uri)) => uri.clone(),
            _ => return Err(Error::MissingField { field: "uri" }),
        };

        let mut builder = Retrofit::builder();
        builder
            .call_factory(TransportCallFactory::new(transport))
            .add_call_adapter_factory(DeferredCallAdapterFactory::INSTANCE)
            .add_converter_factory(ScalarsConverterFactory::create())
            .base_url(uri);

        (self.configure)(&mut builder).map_err(|e| {
            tracing::warn!(error = %e, "Configuration callback failed");
            Error::Configure(e)
        })?;

        let retrofit = builder.build()?;

        tracing::debug!(
            base_url = %retrofit.base_url(),
            call_adapters = retrofit.call_adapter_factories().len(),
            converters = retrofit.converter_factories().len(),
            "Built request factory"
        );

        Ok(retrofit)
    }

    /// Builds the factory and creates a client for service `S`.
    ///
    /// Short for `self.retrofit()?.create::<S>()`.
    ///
    /// # Errors
    ///
    /// Any error of [`retrofit`](Self::retrofit) or [`Retrofit::create`].
    pub fn build<S: Service>(&self) -> Result<S> {
        self.retrofit()?.create::<S>()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("has_transport", &self.transport.is_some())
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}
