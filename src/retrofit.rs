//! The request-factory configuration and the finalized factory it produces.
//!
//! [`RetrofitBuilder`] collects the call factory, call adapter factories, converter
//! factories and base URL. [`Retrofit`] is the immutable result; it is cheap to clone
//! and can create any number of services sharing the same base URL and strategies.

use crate::adapter::{CallAdapterFactory, DefaultCallAdapterFactory, ReturnKind};
use crate::call::CallFactory;
use crate::converter::{BodyType, ConverterFactory};
use crate::service::{Dispatcher, Service};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// An immutable factory for service clients.
///
/// Obtain one from [`ClientBuilder::retrofit`](crate::ClientBuilder::retrofit) or,
/// for full control, from [`Retrofit::builder`].
#[derive(Clone)]
pub struct Retrofit {
    inner: Arc<RetrofitInner>,
}

struct RetrofitInner {
    base_url: Url,
    call_factory: Arc<dyn CallFactory>,
    call_adapters: Vec<Arc<dyn CallAdapterFactory>>,
    converters: Vec<Arc<dyn ConverterFactory>>,
}

impl Retrofit {
    /// Creates an empty [`RetrofitBuilder`].
    pub fn builder() -> RetrofitBuilder {
        RetrofitBuilder::new()
    }

    /// The base URL relative method paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The call factory every request is executed through.
    pub fn call_factory(&self) -> &Arc<dyn CallFactory> {
        &self.inner.call_factory
    }

    /// The call adapter factories, in lookup order. The built-in `Call` passthrough
    /// is last.
    pub fn call_adapter_factories(&self) -> &[Arc<dyn CallAdapterFactory>] {
        &self.inner.call_adapters
    }

    /// The converter factories, in lookup order.
    pub fn converter_factories(&self) -> &[Arc<dyn ConverterFactory>] {
        &self.inner.converters
    }

    /// Returns the first call adapter factory supporting `kind`.
    pub fn call_adapter_for(&self, kind: ReturnKind) -> Option<&Arc<dyn CallAdapterFactory>> {
        self.inner.call_adapters.iter().find(|f| f.supports(kind))
    }

    /// Returns the first converter factory supporting `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConverter`] if no registered factory supports the type.
    pub fn converter_for(&self, ty: &BodyType) -> Result<Arc<dyn ConverterFactory>> {
        self.inner
            .converters
            .iter()
            .find(|f| f.supports(ty))
            .cloned()
            .ok_or(Error::NoConverter {
                type_name: ty.name(),
            })
    }

    /// Creates a client for service `S`.
    ///
    /// Every declared method is validated up front.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidService`] for a malformed method declaration and
    /// [`Error::NoCallAdapter`] for a return kind no registered factory supports.
    pub fn create<S: Service>(&self) -> Result<S> {
        let dispatcher = Dispatcher::resolve::<S>(self)?;

        tracing::debug!(
            service = S::NAME,
            base_url = %self.base_url(),
            "Created service client"
        );

        Ok(S::from_dispatcher(dispatcher))
    }
}

impl fmt::Debug for Retrofit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrofit")
            .field("base_url", &self.inner.base_url.as_str())
            .field("call_adapters", &self.inner.call_adapters)
            .field("converters", &self.inner.converters)
            .finish_non_exhaustive()
    }
}

/// Mutable configuration collected before a [`Retrofit`] is built.
///
/// This is the object a [`configure`](crate::ClientBuilder::configure) callback
/// receives. All setters take `&mut self` so a callback can chain them.
///
/// # Examples
///
/// ```
/// use retrofit_reqwest::{JsonConverterFactory, ReqwestTransport, Retrofit, TransportCallFactory};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), retrofit_reqwest::Error> {
/// let transport = Arc::new(ReqwestTransport::new()?);
///
/// let mut builder = Retrofit::builder();
/// builder
///     .base_url(url::Url::parse("https://api.example.com/v1/")?)
///     .call_factory(TransportCallFactory::new(transport))
///     .add_converter_factory(JsonConverterFactory::create());
///
/// let retrofit = builder.build()?;
/// assert_eq!(retrofit.base_url().path(), "/v1/");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RetrofitBuilder {
    base_url: Option<Url>,
    call_factory: Option<Arc<dyn CallFactory>>,
    call_adapters: Vec<Arc<dyn CallAdapterFactory>>,
    converters: Vec<Arc<dyn ConverterFactory>>,
}

impl RetrofitBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL. Last write wins.
    pub fn base_url(&mut self, url: Url) -> &mut Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the call factory. Last write wins.
    pub fn call_factory(&mut self, factory: impl CallFactory + 'static) -> &mut Self {
        self.call_factory = Some(Arc::new(factory));
        self
    }

    /// Appends a call adapter factory.
    pub fn add_call_adapter_factory(
        &mut self,
        factory: impl CallAdapterFactory + 'static,
    ) -> &mut Self {
        self.call_adapters.push(Arc::new(factory));
        self
    }

    /// Appends a converter factory.
    pub fn add_converter_factory(&mut self, factory: impl ConverterFactory + 'static) -> &mut Self {
        self.converters.push(Arc::new(factory));
        self
    }

    /// The configured base URL, if any.
    pub fn configured_base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The call adapter factories registered so far.
    pub fn call_adapter_factories(&self) -> &[Arc<dyn CallAdapterFactory>] {
        &self.call_adapters
    }

    /// The converter factories registered so far.
    pub fn converter_factories(&self) -> &[Arc<dyn ConverterFactory>] {
        &self.converters
    }

    /// Builds the immutable factory.
    ///
    /// The builder is left untouched and may be built again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] without a base URL or call factory, and
    /// [`Error::InvalidBaseUrl`] if the base URL is not an `http`/`https` URL whose
    /// path ends in `/`.
    pub fn build(&self) -> Result<Retrofit> {
        let base_url = self
            .base_url
            .clone()
            .ok_or(Error::MissingField { field: "base_url" })?;
        validate_base_url(&base_url)?;

        let call_factory = self
            .call_factory
            .clone()
            .ok_or(Error::MissingField {
                field: "call_factory",
            })?;

        let mut call_adapters = self.call_adapters.clone();
        call_adapters.push(Arc::new(DefaultCallAdapterFactory));

        Ok(Retrofit {
            inner: Arc::new(RetrofitInner {
                base_url,
                call_factory,
                call_adapters,
                converters: self.converters.clone(),
            }),
        })
    }
}

impl fmt::Debug for RetrofitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrofitBuilder")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("has_call_factory", &self.call_factory.is_some())
            .field("call_adapters", &self.call_adapters)
            .field("converters", &self.converters)
            .finish()
    }
}

fn validate_base_url(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidBaseUrl(format!(
            "{} must use http or https",
            url
        )));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::InvalidBaseUrl(format!("{} has no host", url)));
    }
    if !url.path().ends_with('/') {
        return Err(Error::InvalidBaseUrl(format!("{} must end in /", url)));
    }
    Ok(())
}
