//! Deferred values: single-assignment results fulfilled when a call completes.

use crate::call::{Call, CancelHandle};
use crate::{Error, Response, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// The eventual body of a service call.
///
/// A `Deferred<T>` is a future that resolves exactly once: with the converted response
/// body when the transport completes successfully, or with the failure otherwise. Like
/// every Rust future it does nothing until polled.
///
/// Cancelling, through [`cancel`](Deferred::cancel) or a [`CancelHandle`] obtained from
/// [`cancel_handle`](Deferred::cancel_handle), aborts the transport's in-flight request.
/// A cancelled value resolves to [`Error::Cancelled`] and never to a response.
///
/// # Examples
///
/// ```no_run
/// # use retrofit_reqwest::{Deferred, Error};
/// # async fn example(greeting: Deferred<String>) -> Result<(), Error> {
/// let handle = greeting.cancel_handle();
/// tokio::spawn(async move {
///     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///     handle.cancel();
/// });
///
/// match greeting.await {
///     Ok(text) => println!("{text}"),
///     Err(Error::Cancelled) => println!("gave up"),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Deferred<T> {
    inner: Option<BoxFuture<T>>,
    cancel: CancelHandle,
}

impl<T> Deferred<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Wraps a call; executing starts on the first poll.
    pub fn new(call: Call<T>) -> Self {
        let cancel = call.cancel_handle();
        let inner: BoxFuture<T> =
            Box::pin(async move { call.execute().await.map(Response::into_data) });
        Self {
            inner: Some(inner),
            cancel,
        }
    }
}

impl<T> Deferred<T> {
    /// Cancels the underlying call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns a handle that can cancel the underlying call from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns `true` once the value has been fulfilled.
    pub fn is_done(&self) -> bool {
        self.inner.is_none()
    }

    /// Transforms the eventual body, keeping the same cancellation channel.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        T: 'static,
        U: 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.map(|fut| -> BoxFuture<U> {
            Box::pin(async move { fut.await.map(f) })
        });
        Deferred {
            inner,
            cancel: self.cancel,
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(fut) = self.inner.as_mut() else {
            return Poll::Ready(Err(Error::AlreadyExecuted));
        };

        match fut.as_mut().poll(cx) {
            Poll::Ready(result) => {
                self.inner = None;
                Poll::Ready(result)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
