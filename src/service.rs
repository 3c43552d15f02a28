//! Declared service interfaces.
//!
//! A service is a closed set of [`MethodDescriptor`]s: HTTP verb, relative path
//! template, parameter bindings and return kind. [`Retrofit::create`] validates the
//! set once and hands the service a [`Dispatcher`] that turns each invocation into a
//! request description, a call and finally the declared return type.
//!
//! # Examples
//!
//! ```
//! use retrofit_reqwest::{Args, Deferred, Dispatcher, MethodDescriptor, Result, Service};
//!
//! struct Greeter {
//!     dispatcher: Dispatcher,
//! }
//!
//! impl Service for Greeter {
//!     const NAME: &'static str = "Greeter";
//!
//!     fn methods() -> Vec<MethodDescriptor> {
//!         vec![
//!             MethodDescriptor::get("hello", "/hello"),
//!             MethodDescriptor::get("greet", "/greet/{name}")
//!                 .path_param("name")
//!                 .query("lang"),
//!         ]
//!     }
//!
//!     fn from_dispatcher(dispatcher: Dispatcher) -> Self {
//!         Self { dispatcher }
//!     }
//! }
//!
//! impl Greeter {
//!     fn hello(&self) -> Result<Deferred<String>> {
//!         self.dispatcher.invoke("hello", Args::new())
//!     }
//!
//!     fn greet(&self, name: &str, lang: Option<&str>) -> Result<Deferred<String>> {
//!         self.dispatcher.invoke(
//!             "greet",
//!             Args::new().path("name", name).query_opt("lang", lang),
//!         )
//!     }
//! }
//! ```
//!
//! [`Retrofit::create`]: crate::Retrofit::create

use crate::adapter::{Adapt, ReturnKind};
use crate::converter::BodyType;
use crate::{Call, Error, RawRequest, Result, Retrofit};
use http::{HeaderName, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How one argument of a service method is bound into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBinding {
    /// Replaces the `{name}` block of the path template.
    Path(&'static str),
    /// Appended as a query parameter.
    Query(&'static str),
    /// Sent as a request header.
    Header(&'static str),
    /// Encoded as the request body.
    Body,
}

/// The declaration of one service method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    name: &'static str,
    method: Method,
    path: &'static str,
    params: Vec<ParamBinding>,
    returns: ReturnKind,
}

impl MethodDescriptor {
    /// Declares a method with an arbitrary HTTP verb.
    ///
    /// The path template is resolved against the base URL. Methods return
    /// [`ReturnKind::Deferred`] unless [`returns`](Self::returns) says otherwise.
    pub fn http(method: Method, name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            method,
            path,
            params: Vec::new(),
            returns: ReturnKind::Deferred,
        }
    }

    /// Declares a `GET` method.
    pub fn get(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::GET, name, path)
    }

    /// Declares a `POST` method.
    pub fn post(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::POST, name, path)
    }

    /// Declares a `PUT` method.
    pub fn put(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::PUT, name, path)
    }

    /// Declares a `PATCH` method.
    pub fn patch(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::PATCH, name, path)
    }

    /// Declares a `DELETE` method.
    pub fn delete(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::DELETE, name, path)
    }

    /// Declares a `HEAD` method.
    pub fn head(name: &'static str, path: &'static str) -> Self {
        Self::http(Method::HEAD, name, path)
    }

    /// Binds a path template block.
    pub fn path_param(mut self, name: &'static str) -> Self {
        self.params.push(ParamBinding::Path(name));
        self
    }

    /// Binds a query parameter.
    pub fn query(mut self, name: &'static str) -> Self {
        self.params.push(ParamBinding::Query(name));
        self
    }

    /// Binds a request header.
    pub fn header(mut self, name: &'static str) -> Self {
        self.params.push(ParamBinding::Header(name));
        self
    }

    /// Binds the request body.
    pub fn body(mut self) -> Self {
        self.params.push(ParamBinding::Body);
        self
    }

    /// Sets the declared return kind.
    pub fn returns(mut self, kind: ReturnKind) -> Self {
        self.returns = kind;
        self
    }

    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The HTTP verb.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The relative path template.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The parameter bindings, in declaration order.
    pub fn params(&self) -> &[ParamBinding] {
        &self.params
    }

    /// The declared return kind.
    pub fn return_kind(&self) -> ReturnKind {
        self.returns
    }

    fn binds(&self, binding: ParamBinding) -> bool {
        self.params.contains(&binding)
    }

    fn binds_path(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, ParamBinding::Path(n) if *n == name))
    }

    fn binds_query(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, ParamBinding::Query(n) if *n == name))
    }

    fn binds_header(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, ParamBinding::Header(n) if n.eq_ignore_ascii_case(name)))
    }
}

/// A client interface made of declared methods.
///
/// Implementors list their methods once in [`methods`](Service::methods) and
/// forward each Rust method to [`Dispatcher::invoke`].
pub trait Service: Sized {
    /// The service name used in errors and logs.
    const NAME: &'static str;

    /// The declared methods.
    fn methods() -> Vec<MethodDescriptor>;

    /// Builds the service around a validated dispatcher.
    fn from_dispatcher(dispatcher: Dispatcher) -> Self;
}

/// Argument values for one invocation, keyed by binding name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    path: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<(BodyType, Value)>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies a path parameter.
    pub fn path(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.path.push((name.into(), value.to_string()));
        self
    }

    /// Supplies a query parameter. Repeating a name sends every value.
    pub fn query(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Supplies a query parameter that is omitted when `None`.
    pub fn query_opt<V: fmt::Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Supplies a header value.
    pub fn header(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    /// Supplies the request body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn body<B>(mut self, body: &B) -> Result<Self>
    where
        B: Serialize + 'static,
    {
        let value =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some((BodyType::of::<B>(), value));
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Param(String),
}

fn parse_template(template: &str) -> std::result::Result<Vec<TemplatePart>, String> {
    let (path, query) = match template.find('?') {
        Some(idx) => template.split_at(idx),
        None => (template, ""),
    };

    if query.contains('{') || query.contains('}') {
        return Err(format!(
            "query string {:?} of the path template must not contain `{{...}}` blocks; bind a query parameter instead",
            query
        ));
    }

    let mut parts = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        match (rest.find('{'), rest.find('}')) {
            (None, None) => {
                parts.push(TemplatePart::Literal(rest.to_string()));
                break;
            }
            (Some(open), Some(close)) if open < close => {
                if open > 0 {
                    parts.push(TemplatePart::Literal(rest[..open].to_string()));
                }
                let name = &rest[open + 1..close];
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(format!("invalid path block name {:?}", name));
                }
                parts.push(TemplatePart::Param(name.to_string()));
                rest = &rest[close + 1..];
            }
            _ => return Err(format!("unbalanced braces in path template {:?}", template)),
        }
    }

    if !query.is_empty() {
        parts.push(TemplatePart::Literal(query.to_string()));
    }

    Ok(parts)
}

/// Bytes escaped in a path parameter: everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a path parameter value as a single path segment.
fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedMethod {
    descriptor: MethodDescriptor,
    template: Vec<TemplatePart>,
}

fn resolve_method(
    service: &'static str,
    descriptor: MethodDescriptor,
    retrofit: &Retrofit,
) -> Result<ResolvedMethod> {
    let method = descriptor.name;
    let invalid = |reason: String| Error::InvalidService {
        service,
        method,
        reason,
    };

    let template = parse_template(descriptor.path).map_err(&invalid)?;

    let mut blocks: Vec<&str> = Vec::new();
    for part in &template {
        if let TemplatePart::Param(name) = part {
            if blocks.contains(&name.as_str()) {
                return Err(invalid(format!("path block {{{}}} appears twice", name)));
            }
            blocks.push(name);
        }
    }

    let mut bodies = 0;
    let mut seen = Vec::new();
    for param in &descriptor.params {
        match param {
            ParamBinding::Path(name) => {
                if seen.contains(param) {
                    return Err(invalid(format!("path parameter {:?} bound twice", name)));
                }
                if !blocks.contains(name) {
                    return Err(invalid(format!(
                        "path template {:?} has no {{{}}} block",
                        descriptor.path, name
                    )));
                }
            }
            ParamBinding::Body => bodies += 1,
            ParamBinding::Query(_) | ParamBinding::Header(_) => {}
        }
        seen.push(*param);
    }

    if let Some(missing) = blocks.iter().find(|b| !descriptor.binds_path(b)) {
        return Err(invalid(format!(
            "path block {{{}}} has no matching path parameter",
            missing
        )));
    }

    if bodies > 1 {
        return Err(invalid("multiple body parameters".to_string()));
    }

    let bodyless = [Method::GET, Method::HEAD, Method::DELETE, Method::OPTIONS];
    if bodies == 1 && bodyless.contains(&descriptor.method) {
        return Err(invalid(format!(
            "{} requests cannot carry a body",
            descriptor.method
        )));
    }

    if retrofit.call_adapter_for(descriptor.returns).is_none() {
        return Err(Error::NoCallAdapter {
            method: descriptor.name,
            kind: descriptor.returns,
        });
    }

    Ok(ResolvedMethod {
        descriptor,
        template,
    })
}

/// Turns invocations of a validated service into adapted calls.
#[derive(Clone)]
pub struct Dispatcher {
    retrofit: Retrofit,
    service: &'static str,
    methods: Arc<HashMap<&'static str, ResolvedMethod>>,
}

impl Dispatcher {
    pub(crate) fn resolve<S: Service>(retrofit: &Retrofit) -> Result<Self> {
        let mut methods = HashMap::new();
        for descriptor in S::methods() {
            let name = descriptor.name;
            let resolved = resolve_method(S::NAME, descriptor, retrofit)?;
            if methods.insert(name, resolved).is_some() {
                return Err(Error::InvalidService {
                    service: S::NAME,
                    method: name,
                    reason: "method declared twice".to_string(),
                });
            }
        }

        Ok(Self {
            retrofit: retrofit.clone(),
            service: S::NAME,
            methods: Arc::new(methods),
        })
    }

    /// The factory this dispatcher was created by.
    pub fn retrofit(&self) -> &Retrofit {
        &self.retrofit
    }

    /// The name of the dispatched service.
    pub fn service_name(&self) -> &'static str {
        self.service
    }

    /// Invokes a declared method and adapts the resulting call into `R`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not declared, if `R` is not the declared
    /// return kind, if the arguments do not match the bindings, or if no converter
    /// handles the body types.
    pub fn invoke<R, T>(&self, method: &str, args: Args) -> Result<R>
    where
        R: Adapt<T>,
        T: DeserializeOwned + 'static,
    {
        let resolved = self.lookup(method)?;
        let descriptor = &resolved.descriptor;

        if R::KIND != descriptor.returns {
            return Err(Error::InvalidArgument {
                method: descriptor.name,
                reason: format!(
                    "declared to return {} but invoked as {}",
                    descriptor.returns,
                    R::KIND
                ),
            });
        }

        let request = self.build_request(resolved, args)?;

        let body_type = BodyType::of::<T>();
        let converter = if body_type.is::<()>() {
            None
        } else {
            Some(self.retrofit.converter_for(&body_type)?)
        };

        tracing::debug!(
            service = self.service,
            method = descriptor.name,
            http_method = %request.method,
            url = %request.url,
            "Dispatching service method"
        );

        let raw = self.retrofit.call_factory().new_call(request);
        Ok(R::adapt(Call::new(raw, converter)))
    }

    /// Builds the request description for an invocation without creating a call.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not declared or the arguments do not match.
    pub fn request(&self, method: &str, args: Args) -> Result<RawRequest> {
        let resolved = self.lookup(method)?;
        self.build_request(resolved, args)
    }

    fn lookup(&self, method: &str) -> Result<&ResolvedMethod> {
        self.methods.get(method).ok_or_else(|| Error::UnknownMethod {
            service: self.service,
            method: method.to_string(),
        })
    }

    fn build_request(&self, resolved: &ResolvedMethod, args: Args) -> Result<RawRequest> {
        let descriptor = &resolved.descriptor;
        let invalid = |reason: String| Error::InvalidArgument {
            method: descriptor.name,
            reason,
        };

        let Args {
            path,
            query,
            headers,
            body,
        } = args;

        for (name, _) in &path {
            if !descriptor.binds_path(name) {
                return Err(invalid(format!("no path parameter named {:?}", name)));
            }
        }
        for (name, _) in &query {
            if !descriptor.binds_query(name) {
                return Err(invalid(format!("no query parameter named {:?}", name)));
            }
        }
        for (name, _) in &headers {
            if !descriptor.binds_header(name) {
                return Err(invalid(format!("no header parameter named {:?}", name)));
            }
        }

        let mut relative = String::new();
        for part in &resolved.template {
            match part {
                TemplatePart::Literal(text) => relative.push_str(text),
                TemplatePart::Param(name) => {
                    let mut values = path.iter().filter(|(n, _)| n == name);
                    let value = match (values.next(), values.next()) {
                        (Some((_, value)), None) => value,
                        (None, _) => {
                            return Err(invalid(format!("missing path parameter {:?}", name)))
                        }
                        (Some(_), Some(_)) => {
                            return Err(invalid(format!(
                                "path parameter {:?} supplied twice",
                                name
                            )))
                        }
                    };
                    if value == "." || value == ".." {
                        return Err(invalid(format!(
                            "path parameter {:?} must not be {:?}",
                            name, value
                        )));
                    }
                    relative.push_str(&encode_path_segment(value));
                }
            }
        }

        let url = self.retrofit.base_url().join(&relative).map_err(|e| {
            invalid(format!(
                "cannot resolve {:?} against {}: {}",
                relative,
                self.retrofit.base_url(),
                e
            ))
        })?;

        let mut request = RawRequest::new(descriptor.method.clone(), url);

        for (name, value) in &query {
            request = request.with_query_param(name, value);
        }

        for (name, value) in &headers {
            let header_name = HeaderName::try_from(name.as_str())
                .map_err(|e| invalid(format!("invalid header name {:?}: {}", name, e)))?;
            let header_value = HeaderValue::try_from(value.as_str())
                .map_err(|e| invalid(format!("invalid value for header {:?}: {}", name, e)))?;
            request.headers.append(header_name, header_value);
        }

        match body {
            Some((body_type, value)) => {
                if !descriptor.binds(ParamBinding::Body) {
                    return Err(invalid("method does not take a body".to_string()));
                }
                let converter = self.retrofit.converter_for(&body_type)?;
                request = request.with_body(converter.encode(&body_type, value)?);
            }
            None if descriptor.binds(ParamBinding::Body) => {
                return Err(invalid("missing request body".to_string()));
            }
            None => {}
        }

        Ok(request)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Dispatcher")
            .field("service", &self.service)
            .field("base_url", &self.retrofit.base_url().as_str())
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawResponse, ReturnKind, Transport, TransportCallFactory};
    use http::{HeaderMap, StatusCode};

    struct NoopTransport;

    #[async_trait::async_trait]
    impl Transport for NoopTransport {
        async fn execute(&self, _request: RawRequest) -> Result<RawResponse> {
            Ok(RawResponse::new(StatusCode::OK, HeaderMap::new(), ""))
        }
    }

    fn retrofit(base: &str) -> Retrofit {
        let mut builder = Retrofit::builder();
        builder
            .base_url(url::Url::parse(base).unwrap())
            .call_factory(TransportCallFactory::new(Arc::new(NoopTransport)))
            .add_call_adapter_factory(crate::DeferredCallAdapterFactory::INSTANCE)
            .add_converter_factory(crate::ScalarsConverterFactory::create());
        builder.build().unwrap()
    }

    struct Users;

    impl Service for Users {
        const NAME: &'static str = "Users";

        fn methods() -> Vec<MethodDescriptor> {
            vec![
                MethodDescriptor::get("user", "users/{id}")
                    .path_param("id")
                    .query("fields")
                    .header("X-Trace"),
                MethodDescriptor::post("rename", "users/{id}/name")
                    .path_param("id")
                    .body()
                    .returns(ReturnKind::Call),
            ]
        }

        fn from_dispatcher(_dispatcher: Dispatcher) -> Self {
            Users
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::resolve::<Users>(&retrofit("http://example.test/api/")).unwrap()
    }

    #[test]
    fn test_parse_template() {
        assert_eq!(
            parse_template("/a/{b}/c?x=1").unwrap(),
            vec![
                TemplatePart::Literal("/a/".to_string()),
                TemplatePart::Param("b".to_string()),
                TemplatePart::Literal("/c".to_string()),
                TemplatePart::Literal("?x=1".to_string()),
            ]
        );
        assert!(parse_template("/a/{b").is_err());
        assert!(parse_template("/a/}b{").is_err());
        assert!(parse_template("/a/{}").is_err());
        assert!(parse_template("/a?x={b}").is_err());
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("abc-1.2_~"), "abc-1.2_~");
        assert_eq!(encode_path_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_path_segment("é"), "%C3%A9");
        assert_eq!(encode_path_segment("ü/?"), "%C3%BC%2F%3F");
        assert_eq!(encode_path_segment("{x}%"), "%7Bx%7D%25");
    }

    #[test]
    fn test_build_request_resolves_relative_path() {
        let request = dispatcher()
            .request(
                "user",
                Args::new()
                    .path("id", "a b")
                    .query("fields", "name")
                    .query("fields", "email")
                    .header("X-Trace", "abc"),
            )
            .unwrap();

        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url.as_str(),
            "http://example.test/api/users/a%20b?fields=name&fields=email"
        );
        assert_eq!(request.headers.get("x-trace").unwrap(), "abc");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_header_binding_ignores_ascii_case() {
        let request = dispatcher()
            .request(
                "user",
                Args::new().path("id", 1).header("x-trace", "lower"),
            )
            .unwrap();

        assert_eq!(request.headers.get("X-Trace").unwrap(), "lower");
    }

    #[test]
    fn test_dispatcher_reports_service_name() {
        assert_eq!(dispatcher().service_name(), "Users");
    }

    #[test]
    fn test_build_request_encodes_body_with_first_matching_converter() {
        let request = dispatcher()
            .request(
                "rename",
                Args::new().path("id", 7).body(&"Alice".to_string()).unwrap(),
            )
            .unwrap();

        let body = request.body.unwrap();
        assert!(body.content_type.starts_with("text/plain"));
        assert_eq!(&body.bytes[..], b"Alice");
    }

    #[test]
    fn test_build_request_argument_errors() {
        let dispatcher = dispatcher();

        let err = dispatcher.request("user", Args::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = dispatcher
            .request("user", Args::new().path("id", 1).path("other", 2))
            .unwrap_err();
        assert!(err.to_string().contains("other"));

        let err = dispatcher
            .request("user", Args::new().path("id", ".."))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = dispatcher
            .request("rename", Args::new().path("id", 1))
            .unwrap_err();
        assert!(err.to_string().contains("missing request body"));

        let err = dispatcher.request("missing", Args::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { .. }));
    }

    #[test]
    fn test_body_without_converter_is_rejected() {
        #[derive(Serialize)]
        struct Payload {
            name: String,
        }

        let err = dispatcher()
            .request(
                "rename",
                Args::new()
                    .path("id", 1)
                    .body(&Payload {
                        name: "x".to_string(),
                    })
                    .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NoConverter { .. }));
    }

    #[test]
    fn test_invoke_rejects_wrong_return_kind() {
        let err = dispatcher()
            .invoke::<Call<String>, String>("user", Args::new().path("id", 1))
            .unwrap_err();
        assert!(err.to_string().contains("declared to return Deferred"));
    }

    fn resolve_one(descriptor: MethodDescriptor) -> Result<ResolvedMethod> {
        resolve_method("Test", descriptor, &retrofit("http://example.test/"))
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(resolve_one(MethodDescriptor::get("a", "/a/{id}")).is_err());
        assert!(resolve_one(MethodDescriptor::get("a", "/a").path_param("id")).is_err());
        assert!(resolve_one(
            MethodDescriptor::get("a", "/a/{id}")
                .path_param("id")
                .path_param("id")
        )
        .is_err());
        assert!(resolve_one(MethodDescriptor::get("a", "/a").body()).is_err());
        assert!(resolve_one(MethodDescriptor::post("a", "/a").body().body()).is_err());
        assert!(resolve_one(MethodDescriptor::post("a", "/a").body()).is_ok());
        assert!(resolve_one(MethodDescriptor::get("a", "/a/{id}").path_param("id")).is_ok());
    }
}
