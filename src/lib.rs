//! # retrofit-reqwest - Declarative HTTP service clients over reqwest
//!
//! Describe a remote HTTP API once as a set of method declarations, and call it through
//! a typed client whose requests run on an asynchronous [`Transport`] (by default
//! [`ReqwestTransport`]) and whose results arrive as [`Deferred`] values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use retrofit_reqwest::{Args, Deferred, Dispatcher, MethodDescriptor, ReqwestTransport, Service};
//!
//! struct HelloService {
//!     dispatcher: Dispatcher,
//! }
//!
//! impl Service for HelloService {
//!     const NAME: &'static str = "HelloService";
//!
//!     fn methods() -> Vec<MethodDescriptor> {
//!         vec![MethodDescriptor::get("hello", "/hello")]
//!     }
//!
//!     fn from_dispatcher(dispatcher: Dispatcher) -> Self {
//!         Self { dispatcher }
//!     }
//! }
//!
//! impl HelloService {
//!     fn hello(&self) -> retrofit_reqwest::Result<Deferred<String>> {
//!         self.dispatcher.invoke("hello", Args::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), retrofit_reqwest::Error> {
//!     let service: HelloService = retrofit_reqwest::builder(ReqwestTransport::new()?)
//!         .uri("http://localhost:5050")
//!         .build()?;
//!
//!     let greeting = service.hello()?.await?;
//!     println!("{greeting}");
//!     Ok(())
//! }
//! ```
//!
//! ## How a call flows
//!
//! 1. [`Dispatcher::invoke`] resolves the declared path template against the base URL and
//!    encodes query, header and body arguments into a [`RawRequest`].
//! 2. The [`CallFactory`] (a [`TransportCallFactory`] bound to the injected transport)
//!    turns the request into a cancellable [`RawCall`].
//! 3. The call adapter for the declared [`ReturnKind`] wraps it: a [`Call`] for callers
//!    that want the full [`Response`], or a [`Deferred`] fulfilled with the converted body.
//!
//! The adapter layer adds no retries and no timeouts; transport failures and non-2xx
//! responses surface unchanged as [`Error`] values. Cancelling a [`Deferred`] aborts the
//! transport's in-flight request.
//!
//! ## Converters
//!
//! The [`ScalarsConverterFactory`] is always registered. Register
//! [`JsonConverterFactory`] from [`ClientBuilder::configure`] to exchange `serde` types
//! as JSON:
//!
//! ```no_run
//! use retrofit_reqwest::{JsonConverterFactory, ReqwestTransport};
//!
//! # fn example() -> Result<(), retrofit_reqwest::Error> {
//! let retrofit = retrofit_reqwest::builder(ReqwestTransport::new()?)
//!     .uri("https://api.example.com/v1/")
//!     .configure(|builder| {
//!         builder.add_converter_factory(JsonConverterFactory::create());
//!         Ok(())
//!     })
//!     .retrofit()?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod builder;
mod call;
pub mod converter;
mod deferred;
mod error;
mod request;
mod response;
mod retrofit;
pub mod service;
pub mod transport;

pub use adapter::{Adapt, CallAdapterFactory, DeferredCallAdapterFactory, ReturnKind};
pub use builder::{builder, ClientBuilder, IntoBaseUri};
pub use call::{Call, CallFactory, CancelHandle, RawCall, TransportCallFactory};
pub use converter::{BodyType, ConverterFactory, JsonConverterFactory, ScalarsConverterFactory};
pub use deferred::Deferred;
pub use error::{BoxError, Error, Result};
pub use request::{RawRequest, RequestBody};
pub use response::{RawResponse, Response};
pub use retrofit::{Retrofit, RetrofitBuilder};
pub use service::{Args, Dispatcher, MethodDescriptor, ParamBinding, Service};
pub use transport::{ReqwestTransport, ReqwestTransportBuilder, Transport};
