//! Error types for building service clients and executing their calls.
//!
//! Configuration problems (missing fields, malformed URIs, failing customization
//! callbacks, malformed method descriptors) surface when a factory or service is
//! built. Transport problems surface from the call or deferred value that issued the
//! request, unchanged, with the raw response kept where one exists.

use http::{HeaderMap, StatusCode};

/// Boxed error accepted from user callbacks and custom transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type of this crate.
///
/// # Examples
///
/// ```
/// use retrofit_reqwest::{ClientBuilder, Error};
///
/// let err = ClientBuilder::new()
///     .uri("http://example.test")
///     .retrofit()
///     .unwrap_err();
///
/// match err {
///     Error::MissingField { field } => assert_eq!(field, "transport"),
///     other => panic!("unexpected error: {other}"),
/// }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required builder field was never supplied.
    #[error("Missing required field `{field}`")]
    MissingField {
        /// Name of the missing field (`transport` or `uri`).
        field: &'static str,
    },

    /// The base URI string could not be parsed.
    #[error("Invalid base URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The base URI parsed but cannot be used to resolve request paths.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The customization callback passed to `configure` failed.
    #[error("Configuration callback failed: {0}")]
    Configure(#[source] BoxError),

    /// A service declared a method the factory cannot turn into requests.
    #[error("Invalid method {service}::{method}: {reason}")]
    InvalidService {
        /// The service name.
        service: &'static str,
        /// The method name.
        method: &'static str,
        /// Why the descriptor was rejected.
        reason: String,
    },

    /// A dispatcher was asked to invoke a method its service never declared.
    #[error("Unknown method {service}::{method}")]
    UnknownMethod {
        /// The service name.
        service: &'static str,
        /// The requested method name.
        method: String,
    },

    /// The arguments of an invocation do not match the method's bindings.
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArgument {
        /// The method name.
        method: &'static str,
        /// What was wrong with the arguments.
        reason: String,
    },

    /// No registered call adapter handles the declared return kind.
    #[error("No call adapter for {method} returning {kind}")]
    NoCallAdapter {
        /// The method name.
        method: &'static str,
        /// The declared return kind.
        kind: crate::adapter::ReturnKind,
    },

    /// No registered converter handles the body type.
    #[error("No converter registered for type {type_name}")]
    NoConverter {
        /// The Rust type name of the body.
        type_name: &'static str,
    },

    /// A network-level error raised by the reqwest transport.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A failure raised by a custom transport.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// The server returned a non-2xx HTTP status code.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// Failed to convert the response body into the declared type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The converter error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The call was cancelled before the transport completed.
    #[error("Call was cancelled")]
    Cancelled,

    /// A one-shot call or deferred value was executed a second time.
    #[error("Call already executed")]
    AlreadyExecuted,
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` if the call ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns `true` if the error was raised while assembling a factory or service,
    /// before any request was made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingField { .. }
                | Error::InvalidUri(_)
                | Error::InvalidBaseUrl(_)
                | Error::Configure(_)
                | Error::InvalidService { .. }
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
