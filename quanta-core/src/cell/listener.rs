//! Listener identifiers and callback types.
//!
//! Closures have no identity in Rust, so every registration (cell listener,
//! local event handler, decay hook, bus listener) hands back a
//! [`ListenerId`] that is later used to remove it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::slot::Cell;

/// Unique identifier for a registered callback.
///
/// IDs come from one process-wide counter, so an ID never collides with
/// another registration on any cell or bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives `(value, cell)` on every notified write.
pub type Listener<T> = Arc<dyn Fn(&T, &Cell<T>) + Send + Sync>;

/// Receives the cell that emitted a local event.
pub type EventHandler<T> = Arc<dyn Fn(&Cell<T>) + Send + Sync>;

/// Runs once when the cell decays.
pub type DecayHook<T> = Arc<dyn Fn(&Cell<T>) + Send + Sync>;

/// Transform applied before a write; `None` discards the write.
pub type Pipe<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::default();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert!(id1.raw() < id2.raw());
    }
}
