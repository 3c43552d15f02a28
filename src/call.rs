//! Call execution: the strategy that turns request descriptions into transport calls.
//!
//! A [`CallFactory`] receives the [`RawRequest`] built for each method invocation and
//! returns a one-shot [`RawCall`]. [`TransportCallFactory`] is the factory bound to an
//! injected [`Transport`]; it adds no retry or timeout policy of its own.
//!
//! [`Call`] is the typed form handed to call adapters. It executes the raw call,
//! rejects non-2xx statuses and converts the body into `T`.

use crate::converter::{BodyType, ConverterFactory};
use crate::{Error, RawRequest, RawResponse, Response, Result, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// Produces a call for each request description.
pub trait CallFactory: Send + Sync {
    /// Creates a new, not yet executed call for `request`.
    fn new_call(&self, request: RawRequest) -> RawCall;
}

/// The [`CallFactory`] that executes every call on an injected [`Transport`].
#[derive(Clone)]
pub struct TransportCallFactory {
    transport: Arc<dyn Transport>,
}

impl TransportCallFactory {
    /// Binds a factory to `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl fmt::Debug for TransportCallFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCallFactory").finish_non_exhaustive()
    }
}

impl CallFactory for TransportCallFactory {
    fn new_call(&self, request: RawRequest) -> RawCall {
        RawCall::new(Arc::clone(&self.transport), request)
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable handle that cancels a call from anywhere.
///
/// Cancelling drops the transport's in-flight future, which aborts the request, and
/// makes the call resolve to [`Error::Cancelled`]. Cancelling a call that already
/// completed has no effect on its result.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// A single, cancellable request on a transport.
pub struct RawCall {
    transport: Arc<dyn Transport>,
    request: RawRequest,
    cancel: CancelHandle,
    executed: AtomicBool,
}

impl RawCall {
    /// Creates a call that will execute `request` on `transport`.
    pub fn new(transport: Arc<dyn Transport>, request: RawRequest) -> Self {
        Self {
            transport,
            request,
            cancel: CancelHandle::default(),
            executed: AtomicBool::new(false),
        }
    }

    /// The request this call executes.
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    /// Executes the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExecuted`] on a second execution, [`Error::Cancelled`]
    /// if the call is cancelled before the transport completes, and the transport's
    /// own error otherwise.
    pub async fn execute(&self) -> Result<RawResponse> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyExecuted);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(
                    method = %self.request.method,
                    url = %self.request.url,
                    "Call cancelled while in flight"
                );
                Err(Error::Cancelled)
            }
            result = self.transport.execute(self.request.clone()) => result,
        }
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `true` once the call has been executed.
    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    /// Returns a handle that can cancel this call from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl fmt::Debug for RawCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCall")
            .field("request", &self.request)
            .field("cancelled", &self.is_cancelled())
            .field("executed", &self.is_executed())
            .finish()
    }
}

/// A typed call whose successful result is a converted [`Response<T>`].
///
/// This is the return shape a service method gets when it is declared with
/// [`ReturnKind::Call`](crate::ReturnKind::Call).
pub struct Call<T> {
    raw: RawCall,
    converter: Option<Arc<dyn ConverterFactory>>,
    body_type: BodyType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Call<T>
where
    T: DeserializeOwned + 'static,
{
    /// Creates a typed call.
    ///
    /// `converter` may be `None` only for `T = ()`, in which case the body is discarded.
    pub fn new(raw: RawCall, converter: Option<Arc<dyn ConverterFactory>>) -> Self {
        Self {
            raw,
            converter,
            body_type: BodyType::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Executes the call and converts the response.
    ///
    /// # Errors
    ///
    /// Besides the errors of [`RawCall::execute`], returns [`Error::HttpError`] for a
    /// non-2xx status and [`Error::DeserializationFailed`] if the body cannot be
    /// converted into `T`.
    pub async fn execute(&self) -> Result<Response<T>> {
        let start_time = Instant::now();
        let raw = self.raw.execute().await.inspect_err(|e| {
            if !e.is_cancelled() {
                tracing::warn!(
                    error = %e,
                    method = %self.raw.request.method,
                    url = %self.raw.request.url,
                    "Request failed"
                );
            }
        })?;
        self.convert(raw, start_time)
    }

    fn convert(&self, raw: RawResponse, start_time: Instant) -> Result<Response<T>> {
        let latency = start_time.elapsed();
        let status = raw.status;
        let raw_body = raw.text();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            url = %self.raw.request.url,
            "Received HTTP response"
        );

        if !status.is_success() {
            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Server error (5xx)"
                );
            }

            return Err(Error::HttpError {
                status,
                raw_response: raw_body,
                headers: raw.headers,
            });
        }

        let decoded = match &self.converter {
            Some(converter) => converter.decode(&self.body_type, &raw_body),
            None => Ok(Value::Null),
        };

        match decoded.and_then(|value| serde_json::from_value::<T>(value).map_err(|e| e.to_string())) {
            Ok(data) => Ok(Response::new(data, raw_body, status, raw.headers, latency)),
            Err(serde_error) => {
                tracing::error!(
                    error = %serde_error,
                    raw_response = %raw_body,
                    target = self.body_type.name(),
                    "Failed to deserialize response"
                );

                Err(Error::DeserializationFailed {
                    raw_response: raw_body,
                    serde_error,
                    status,
                })
            }
        }
    }
}

impl<T> Call<T> {
    /// The request this call executes.
    pub fn request(&self) -> &RawRequest {
        self.raw.request()
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.raw.cancel();
    }

    /// Returns `true` once the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.raw.is_cancelled()
    }

    /// Returns `true` once the call has been executed.
    pub fn is_executed(&self) -> bool {
        self.raw.is_executed()
    }

    /// Returns a handle that can cancel this call from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.raw.cancel_handle()
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("raw", &self.raw)
            .field("body_type", &self.body_type)
            .finish()
    }
}
