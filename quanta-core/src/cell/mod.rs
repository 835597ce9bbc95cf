//! Reactive Cells
//!
//! A cell is the atomic reactive container: a value slot with an ordered
//! listener list, a flag word describing its state, and an optional pipe,
//! realm, kind and getter.
//!
//! # Lifecycle
//!
//! - **Create**: empty, or seeded through the normal write path.
//! - **Mutate**: only through [`Cell::set`] / [`Cell::silent`].
//! - **Decay**: [`Cell::decay`] releases everything and zeroes the flags.
//!
//! # Async values
//!
//! A pending value is written with [`Cell::resolve`]. The cell is flagged
//! `AWAITING` until the future completes; completion performs an ordinary
//! write. Nothing here spawns tasks: the caller drives the future.

mod slot;
mod flags;
mod listener;
mod options;
mod pending;
mod truthy;

pub use slot::{Cell, CellChange, CellValue, WeakCell};
pub use flags::CellFlags;
pub use listener::{DecayHook, EventHandler, Listener, ListenerId, Pipe};
pub use options::CellOptions;
pub use pending::Fetch;
pub use truthy::Truthy;

#[cfg(test)]
mod async_tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn resolve_marks_awaiting_until_completion() {
        let cell = Cell::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        cell.up(move |v: &i32, _| seen_clone.store(*v, Ordering::SeqCst));

        let (tx, rx) = tokio::sync::oneshot::channel::<i32>();
        let pending = cell.resolve(async move { rx.await.unwrap_or_default() });
        assert!(cell.is_awaiting());
        assert!(cell.is_empty());

        tx.send(12).unwrap();
        pending.await;

        assert!(!cell.is_awaiting());
        assert_eq!(cell.value(), Some(12));
        assert_eq!(seen.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn try_resolve_returns_rejection() {
        let cell = Cell::with_value(1);
        let outcome = cell
            .try_resolve(async { Err::<i32, &str>("unreachable host") })
            .await;
        assert_eq!(outcome, Err("unreachable host"));
        assert!(!cell.is_awaiting());
        assert_eq!(cell.value(), Some(1));

        cell.try_resolve(async { Ok::<i32, &str>(2) }).await.unwrap();
        assert_eq!(cell.value(), Some(2));
    }

    #[tokio::test]
    async fn async_getter_is_pending_until_awaited() {
        let cell: Cell<String> = Cell::new();
        cell.set_async_getter(|| async { "loaded".to_string() });
        assert!(cell.is_async());

        let fetch = cell.fetch().unwrap();
        assert!(!fetch.is_ready());
        assert_eq!(fetch.into_value().await, "loaded");
        assert!(cell.is_empty());
    }
}
