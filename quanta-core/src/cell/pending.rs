//! Getters and pending values.
//!
//! A cell may carry a getter that produces its value on demand. Async
//! getters hand back a future; nothing polls it until the caller (usually a
//! `strong` fusion's `settle()`) awaits it.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Result of calling a cell's getter.
pub enum Fetch<T> {
    /// The value is available now.
    Ready(T),
    /// The value arrives when the future completes.
    Pending(BoxFuture<'static, T>),
}

impl<T> Fetch<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Fetch::Ready(_))
    }

    /// Await the value regardless of variant.
    pub async fn into_value(self) -> T {
        match self {
            Fetch::Ready(value) => value,
            Fetch::Pending(future) => future.await,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Fetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fetch::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Fetch::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A getter attached to a cell.
pub(crate) enum Getter<T> {
    Sync(Arc<dyn Fn() -> T + Send + Sync>),
    Async(Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>),
}

impl<T> Getter<T> {
    pub(crate) fn call(&self) -> Fetch<T> {
        match self {
            Getter::Sync(get) => Fetch::Ready(get()),
            Getter::Async(get) => Fetch::Pending(get()),
        }
    }

    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Getter::Async(_))
    }
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        match self {
            Getter::Sync(get) => Getter::Sync(Arc::clone(get)),
            Getter::Async(get) => Getter::Async(Arc::clone(get)),
        }
    }
}
