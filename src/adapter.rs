//! Result adaptation: what a service method hands back to its caller.
//!
//! A method declares its [`ReturnKind`]. When a service is created, each declared kind
//! must be supported by one of the registered [`CallAdapterFactory`]s; the factory that
//! supports [`ReturnKind::Call`] is always present and is consulted last. The actual
//! wrapping is done by the [`Adapt`] implementation of the caller's return type.

use crate::{Call, Deferred};
use serde::de::DeserializeOwned;
use std::fmt;

/// The return shape of a service method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// A [`Call`] the caller executes, yielding the full [`Response`](crate::Response).
    Call,
    /// A [`Deferred`] value fulfilled with the response body.
    Deferred,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Call => f.write_str("Call"),
            ReturnKind::Deferred => f.write_str("Deferred"),
        }
    }
}

/// Declares which return kinds can be produced for service methods.
pub trait CallAdapterFactory: Send + Sync + fmt::Debug {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if this factory adapts calls into `kind`.
    fn supports(&self, kind: ReturnKind) -> bool;
}

/// Adapts calls into [`Deferred`] values. Supports nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredCallAdapterFactory;

impl DeferredCallAdapterFactory {
    /// The shared instance registered by [`ClientBuilder`](crate::ClientBuilder).
    pub const INSTANCE: DeferredCallAdapterFactory = DeferredCallAdapterFactory;
}

impl CallAdapterFactory for DeferredCallAdapterFactory {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn supports(&self, kind: ReturnKind) -> bool {
        kind == ReturnKind::Deferred
    }
}

/// Passes [`Call`]s through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DefaultCallAdapterFactory;

impl CallAdapterFactory for DefaultCallAdapterFactory {
    fn name(&self) -> &'static str {
        "call"
    }

    fn supports(&self, kind: ReturnKind) -> bool {
        kind == ReturnKind::Call
    }
}

/// A return type that can be produced from a typed [`Call`].
pub trait Adapt<T>: Sized {
    /// The return kind this type corresponds to.
    const KIND: ReturnKind;

    /// Wraps the call.
    fn adapt(call: Call<T>) -> Self;
}

impl<T> Adapt<T> for Call<T>
where
    T: DeserializeOwned + 'static,
{
    const KIND: ReturnKind = ReturnKind::Call;

    fn adapt(call: Call<T>) -> Self {
        call
    }
}

impl<T> Adapt<T> for Deferred<T>
where
    T: DeserializeOwned + Send + 'static,
{
    const KIND: ReturnKind = ReturnKind::Deferred;

    fn adapt(call: Call<T>) -> Self {
        Deferred::new(call)
    }
}
