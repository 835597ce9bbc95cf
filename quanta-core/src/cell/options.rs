//! Cell construction options.

use std::fmt;
use std::sync::Arc;

use crate::bus::Realm;
use crate::config::{DEFAULT_CHANGE_EVENT, DEFAULT_WAKE_SUFFIX};
use crate::kind::Registry;

use super::listener::Pipe;

/// Every option a [`Cell`](super::Cell) recognises, with its default.
///
/// ```rust,ignore
/// let cell = Cell::with_options(
///     CellOptions::new()
///         .value(1)
///         .id("counter")
///         .dedup(true)
///         .pipe(|v: i32| (v >= 0).then_some(v)),
/// );
/// ```
pub struct CellOptions<T> {
    /// Initial value; written through the normal write path. Default `None`.
    pub value: Option<T>,
    /// Realm the cell emits its side-channel events on. Default `None`.
    pub realm: Option<Realm>,
    /// Name used in realm event names. Defaults to the cell's uid.
    pub id: Option<String>,
    /// Drop writes equal to the current value. Default `false`.
    pub dedup: bool,
    /// Notify listeners without retaining the value. Default `false`.
    pub stateless: bool,
    /// Transform applied before every write. Default `None`.
    pub pipe: Option<Pipe<T>>,
    /// Emit the change event locally and on the realm. Default `false`.
    pub emit_change: bool,
    /// Catch and log listener panics. Default `false`.
    pub isolate: bool,
    /// Compiled kind applied at construction. Default `None`.
    pub kind: Option<Arc<Registry<T>>>,
    /// Suffix of the wake event. Default `"AWAKE"`.
    pub wake_suffix: String,
    /// Name of the change event. Default `"change"`.
    pub change_event: String,
}

impl<T> Default for CellOptions<T> {
    fn default() -> Self {
        Self {
            value: None,
            realm: None,
            id: None,
            dedup: false,
            stateless: false,
            pipe: None,
            emit_change: false,
            isolate: false,
            kind: None,
            wake_suffix: DEFAULT_WAKE_SUFFIX.to_string(),
            change_event: DEFAULT_CHANGE_EVENT.to_string(),
        }
    }
}

impl<T> CellOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    pub fn realm(mut self, realm: Realm) -> Self {
        self.realm = Some(realm);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.stateless = stateless;
        self
    }

    pub fn pipe<F>(mut self, pipe: F) -> Self
    where
        F: Fn(T) -> Option<T> + Send + Sync + 'static,
    {
        self.pipe = Some(Arc::new(pipe));
        self
    }

    pub fn emit_change(mut self, emit_change: bool) -> Self {
        self.emit_change = emit_change;
        self
    }

    pub fn isolate(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    pub fn kind(mut self, registry: Arc<Registry<T>>) -> Self {
        self.kind = Some(registry);
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for CellOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellOptions")
            .field("value", &self.value)
            .field("realm", &self.realm.as_ref().map(|r| r.name().to_string()))
            .field("id", &self.id)
            .field("dedup", &self.dedup)
            .field("stateless", &self.stateless)
            .field("pipe", &self.pipe.is_some())
            .field("emit_change", &self.emit_change)
            .field("isolate", &self.isolate)
            .field("kind", &self.kind.is_some())
            .finish()
    }
}
