//! Cell Implementation
//!
//! A Cell holds an optional value, a flag word and an ordered listener list.
//! Every mutation goes through one write path:
//!
//! 1. The pipe transforms the incoming value; `None` discards the write.
//! 2. With `DEDUP` set, a value equal to the current one is dropped.
//! 3. The kind's before-change hook observes the value.
//! 4. Unless `STATELESS`, the value is stored; `EMPTY` is cleared once.
//! 5. On the very first write, an attached realm receives the wake event.
//! 6. Listeners run in subscription order with `(value, cell)`.
//! 7. With `EMIT_CHANGE`, the change event fires locally and on the realm.
//!
//! # Re-entrancy
//!
//! From step 3 on, the `SETTING` flag is held. A write to the same cell
//! from inside the before-change hook or a listener is ignored, not queued. Listeners see a snapshot
//! of the listener list taken before the pass starts, so `up`/`down` during
//! a pass only affect later writes.
//!
//! # Locking
//!
//! State sits behind a `parking_lot::Mutex`. The lock is never held while a
//! user callback runs, so callbacks may freely read, subscribe to or write
//! other cells.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::bus::Realm;
use crate::error::{Error, Result};
use crate::kind::Registry;

use super::flags::CellFlags;
use super::listener::{DecayHook, EventHandler, Listener, ListenerId, Pipe};
use super::options::CellOptions;
use super::pending::{Fetch, Getter};

/// Counter for generating unique cell uids.
static CELL_UID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    CELL_UID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Bounds every cell value satisfies.
pub trait CellValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> CellValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Payload of the change event emitted on a cell's realm.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange<T> {
    pub uid: u64,
    pub id: Option<String>,
    pub value: T,
}

type ListenerList<T> = SmallVec<[(ListenerId, Listener<T>); 4]>;
type HandlerList<T> = SmallVec<[(ListenerId, EventHandler<T>); 2]>;

struct Inner<T> {
    value: Option<T>,
    flags: CellFlags,
    /// Allocated on first subscribe; `Some` whenever `HAS_LISTENERS` is set.
    listeners: Option<ListenerList<T>>,
    events: Option<IndexMap<String, HandlerList<T>>>,
    decay_hooks: SmallVec<[(ListenerId, DecayHook<T>); 2]>,
    pipe: Option<Pipe<T>>,
    realm: Option<Realm>,
    id: Option<String>,
    kind: Option<Arc<Registry<T>>>,
    getter: Option<Getter<T>>,
    wake_suffix: String,
    change_event: String,
}

/// Everything a write needs after the lock is released.
struct Delivery<T> {
    first: bool,
    listeners: SmallVec<[Listener<T>; 4]>,
    change_handlers: SmallVec<[EventHandler<T>; 2]>,
    realm: Option<Realm>,
    name: String,
    wake_suffix: String,
    change_event: String,
    emit_change: bool,
    isolate: bool,
}

/// Clears `SETTING` and `SILENT` when the write pass ends, panics included.
struct SettingGuard<'a, T> {
    inner: &'a Mutex<Inner<T>>,
}

impl<T> Drop for SettingGuard<'_, T> {
    fn drop(&mut self) {
        self.inner
            .lock()
            .flags
            .remove(CellFlags::SETTING | CellFlags::SILENT);
    }
}

/// A reactive value slot.
///
/// Cloning a cell yields another handle to the same slot.
///
/// ```rust,ignore
/// let count = Cell::with_value(1);
/// count.up(|v, _| println!("count = {v}"));  // prints 1 immediately
/// count.set(2);                               // prints 2
/// count.decay();
/// ```
pub struct Cell<T> {
    uid: u64,
    inner: Arc<Mutex<Inner<T>>>,
}

/// A non-owning handle to a cell.
pub struct WeakCell<T> {
    uid: u64,
    inner: Weak<Mutex<Inner<T>>>,
}

impl<T: CellValue> Cell<T> {
    /// Create an empty cell with default options.
    pub fn new() -> Self {
        Self::with_options(CellOptions::default())
    }

    /// Create a cell seeded with `value`.
    pub fn with_value(value: T) -> Self {
        Self::with_options(CellOptions::new().value(value))
    }

    /// Create a cell from explicit options.
    ///
    /// The kind's create hook runs before the initial value is written.
    pub fn with_options(options: CellOptions<T>) -> Self {
        let CellOptions {
            value,
            realm,
            id,
            dedup,
            stateless,
            pipe,
            emit_change,
            isolate,
            kind,
            wake_suffix,
            change_event,
        } = options;

        let mut flags = CellFlags::EMPTY;
        flags.set(CellFlags::DEDUP, dedup);
        flags.set(CellFlags::STATELESS, stateless);
        flags.set(CellFlags::EMIT_CHANGE, emit_change);
        flags.set(CellFlags::ISOLATE, isolate);
        flags.set(CellFlags::HAS_REALM, realm.is_some());

        let cell = Self {
            uid: next_uid(),
            inner: Arc::new(Mutex::new(Inner {
                value: None,
                flags,
                listeners: None,
                events: None,
                decay_hooks: SmallVec::new(),
                pipe,
                realm,
                id,
                kind: kind.clone(),
                getter: None,
                wake_suffix,
                change_event,
            })),
        };
        tracing::trace!(uid = cell.uid, ?flags, "cell created");

        if let Some(kind) = kind {
            kind.on_create(&cell);
        }
        if let Some(value) = value {
            cell.set(value);
        }
        cell
    }

    /// The process-wide unique id of this cell.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The configured id, if any.
    pub fn id(&self) -> Option<String> {
        self.inner.lock().id.clone()
    }

    pub fn flags(&self) -> CellFlags {
        self.inner.lock().flags
    }

    /// True until the first successful write, and again after `decay()`.
    pub fn is_empty(&self) -> bool {
        !self.inner.lock().flags.contains(CellFlags::WAS_SET)
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.lock().flags.contains(CellFlags::HAS_LISTENERS)
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .listeners
            .as_ref()
            .map_or(0, |listeners| listeners.len())
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.lock().flags.contains(CellFlags::AWAITING)
    }

    /// Whether this cell is the result of a fusion.
    pub fn is_wired(&self) -> bool {
        self.inner.lock().flags.contains(CellFlags::WIRED)
    }

    /// A clone of the current value.
    pub fn value(&self) -> Option<T> {
        self.inner.lock().value.clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// The cell is locked while `f` runs; `f` must not touch this cell.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.lock().value.as_ref())
    }

    /// Write a value and notify subscribers.
    pub fn set(&self, value: T) {
        self.write(value, false);
    }

    /// Write a value with every notification path suppressed.
    pub fn silent(&self, value: T) {
        self.write(value, true);
    }

    /// Write the result of `f` applied to the current value.
    ///
    /// Does nothing on a cell without a value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let inner = self.inner.lock();
            match inner.value.as_ref() {
                Some(current) => f(current),
                None => return,
            }
        };
        self.set(next);
    }

    fn write(&self, value: T, silent: bool) {
        let (pipe, kind) = {
            let inner = self.inner.lock();
            if inner.flags.contains(CellFlags::SETTING) {
                tracing::trace!(uid = self.uid, "re-entrant write ignored");
                return;
            }
            (inner.pipe.clone(), inner.kind.clone())
        };

        let value = match pipe {
            Some(pipe) => match pipe(value) {
                Some(value) => value,
                None => {
                    tracing::trace!(uid = self.uid, "write rejected by pipe");
                    return;
                }
            },
            None => value,
        };

        {
            let mut inner = self.inner.lock();
            if inner.flags.contains(CellFlags::SETTING) {
                tracing::trace!(uid = self.uid, "re-entrant write ignored");
                return;
            }
            if inner.flags.contains(CellFlags::DEDUP) && inner.value.as_ref() == Some(&value) {
                tracing::trace!(uid = self.uid, "duplicate write dropped");
                return;
            }
            inner.flags.insert(CellFlags::SETTING);
        }
        let _guard = SettingGuard { inner: &self.inner };

        if let Some(kind) = &kind {
            kind.before_change(self, &value);
        }

        let delivery = {
            let mut inner = self.inner.lock();
            let first = !inner.flags.contains(CellFlags::WAS_SET);
            inner.flags.remove(CellFlags::EMPTY);
            inner.flags.insert(CellFlags::WAS_SET);
            if silent {
                inner.flags.insert(CellFlags::SILENT);
            }
            if !inner.flags.contains(CellFlags::STATELESS) {
                inner.value = Some(value.clone());
            }
            Self::delivery(&inner, first, self.uid)
        };

        if silent {
            tracing::trace!(uid = self.uid, "silent write");
            return;
        }

        if delivery.first {
            if let Some(realm) = &delivery.realm {
                let event = format!("{}:{}", delivery.name, delivery.wake_suffix);
                tracing::trace!(uid = self.uid, realm = realm.name(), %event, "cell awake");
                realm.emit(&event, value.clone());
            }
        }

        for listener in &delivery.listeners {
            self.invoke(delivery.isolate, || listener(&value, self));
        }

        if delivery.emit_change {
            for handler in &delivery.change_handlers {
                self.invoke(delivery.isolate, || handler(self));
            }
            if let Some(realm) = &delivery.realm {
                let change = CellChange {
                    uid: self.uid,
                    id: self.inner.lock().id.clone(),
                    value,
                };
                realm.emit(&delivery.change_event, change);
            }
        }
    }

    fn delivery(inner: &Inner<T>, first: bool, uid: u64) -> Delivery<T> {
        let emit_change = inner.flags.contains(CellFlags::EMIT_CHANGE);
        Delivery {
            first,
            listeners: inner
                .listeners
                .iter()
                .flatten()
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
            change_handlers: match (&inner.events, emit_change) {
                (Some(events), true) => events
                    .get(&inner.change_event)
                    .into_iter()
                    .flatten()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect(),
                _ => SmallVec::new(),
            },
            realm: inner.realm.clone(),
            name: inner.id.clone().unwrap_or_else(|| uid.to_string()),
            wake_suffix: inner.wake_suffix.clone(),
            change_event: inner.change_event.clone(),
            emit_change,
            isolate: inner.flags.contains(CellFlags::ISOLATE),
        }
    }

    fn invoke(&self, isolate: bool, call: impl FnOnce()) {
        if !isolate {
            call();
            return;
        }
        if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
            tracing::error!(uid = self.uid, "listener panicked; continuing notification");
        }
    }

    /// Subscribe a listener.
    ///
    /// If the cell holds a value, the listener is called with it once,
    /// synchronously, before `up` returns.
    pub fn up<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T, &Cell<T>) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        let listener: Listener<T> = Arc::new(listener);
        let (current, isolate) = {
            let mut inner = self.inner.lock();
            inner
                .listeners
                .get_or_insert_with(SmallVec::new)
                .push((id, Arc::clone(&listener)));
            inner.flags.insert(CellFlags::HAS_LISTENERS);
            (
                inner.value.clone(),
                inner.flags.contains(CellFlags::ISOLATE),
            )
        };
        if let Some(value) = current {
            self.invoke(isolate, || listener(&value, self));
        }
        id
    }

    /// Unsubscribe a listener. Returns whether it was subscribed.
    pub fn down(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(listeners) = inner.listeners.as_mut() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            inner.listeners = None;
            inner.flags.remove(CellFlags::HAS_LISTENERS);
        }
        removed
    }

    /// Register a local event handler.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Cell<T>) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        let mut inner = self.inner.lock();
        inner
            .events
            .get_or_insert_with(IndexMap::new)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        inner.flags.insert(CellFlags::HAS_EVENTS);
        id
    }

    /// Remove a local event handler. Returns whether it was registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(events) = inner.events.as_mut() else {
            return false;
        };
        let mut removed = false;
        if let Some(handlers) = events.get_mut(event) {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed = handlers.len() != before;
            if handlers.is_empty() {
                events.shift_remove(event);
            }
        }
        if events.is_empty() {
            inner.events = None;
            inner.flags.remove(CellFlags::HAS_EVENTS);
        }
        removed
    }

    /// Fire a local event.
    pub fn emit(&self, event: &str) {
        let (handlers, isolate): (SmallVec<[EventHandler<T>; 2]>, bool) = {
            let inner = self.inner.lock();
            let handlers = inner
                .events
                .as_ref()
                .and_then(|events| events.get(event))
                .into_iter()
                .flatten()
                .map(|(_, handler)| Arc::clone(handler))
                .collect();
            (handlers, inner.flags.contains(CellFlags::ISOLATE))
        };
        for handler in &handlers {
            self.invoke(isolate, || handler(self));
        }
    }

    /// Register a hook that runs once when the cell decays.
    pub fn on_decay<F>(&self, hook: F) -> ListenerId
    where
        F: Fn(&Cell<T>) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.inner.lock().decay_hooks.push((id, Arc::new(hook)));
        id
    }

    /// Remove a decay hook. Returns whether it was registered.
    pub fn off_decay(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.decay_hooks.len();
        inner.decay_hooks.retain(|(hook_id, _)| *hook_id != id);
        inner.decay_hooks.len() != before
    }

    /// Tear the cell down.
    ///
    /// Runs the kind's decay hook, releases listeners, handlers, pipe, realm,
    /// kind and value, resets the flags to zero, then runs the registered
    /// decay hooks. Later writes behave as on a fresh default cell.
    pub fn decay(&self) {
        let kind = self.inner.lock().kind.clone();
        if let Some(kind) = kind {
            kind.on_decay(self);
        }

        let hooks = {
            let mut inner = self.inner.lock();
            inner.value = None;
            inner.flags = CellFlags::empty();
            inner.listeners = None;
            inner.events = None;
            inner.pipe = None;
            inner.realm = None;
            inner.kind = None;
            inner.getter = None;
            std::mem::take(&mut inner.decay_hooks)
        };
        tracing::debug!(uid = self.uid, hooks = hooks.len(), "cell decayed");

        for (_, hook) in hooks {
            hook(self);
        }
    }

    /// Write the output of `pending` once it completes.
    ///
    /// The cell is marked awaiting immediately; the returned future must be
    /// driven for the write to happen.
    pub fn resolve<F>(&self, pending: F) -> impl Future<Output = ()> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.inner.lock().flags.insert(CellFlags::AWAITING);
        let cell = self.clone();
        async move {
            let value = pending.await;
            cell.inner.lock().flags.remove(CellFlags::AWAITING);
            cell.set(value);
        }
    }

    /// Like [`resolve`](Self::resolve) for fallible sources.
    ///
    /// A rejection leaves the value untouched and is handed back to whoever
    /// awaits the returned future.
    pub fn try_resolve<F, E>(
        &self,
        pending: F,
    ) -> impl Future<Output = std::result::Result<(), E>> + Send + 'static
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.inner.lock().flags.insert(CellFlags::AWAITING);
        let cell = self.clone();
        async move {
            let outcome = pending.await;
            cell.inner.lock().flags.remove(CellFlags::AWAITING);
            match outcome {
                Ok(value) => {
                    cell.set(value);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    }

    /// Attach a synchronous getter.
    pub fn set_getter<F>(&self, getter: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.inner.lock().getter = Some(Getter::Sync(Arc::new(getter)));
    }

    /// Attach an asynchronous getter.
    pub fn set_async_getter<F, Fut>(&self, getter: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.inner.lock().getter = Some(Getter::Async(Arc::new(move || getter().boxed())));
    }

    pub fn clear_getter(&self) {
        self.inner.lock().getter = None;
    }

    pub fn has_getter(&self) -> bool {
        self.inner.lock().getter.is_some()
    }

    /// Whether the attached getter is asynchronous.
    pub fn is_async(&self) -> bool {
        self.inner
            .lock()
            .getter
            .as_ref()
            .is_some_and(Getter::is_async)
    }

    /// Call the getter, if one is attached. The cell itself is not written.
    pub fn fetch(&self) -> Option<Fetch<T>> {
        let getter = self.inner.lock().getter.clone();
        getter.map(|getter| getter.call())
    }

    /// The compiled kind this cell was built with.
    pub fn kind(&self) -> Option<Arc<Registry<T>>> {
        self.inner.lock().kind.clone()
    }

    /// Whether the kind provides a method or property called `name`.
    pub fn responds_to(&self, name: &str) -> bool {
        self.kind().is_some_and(|kind| {
            kind.prototype().method(name).is_some() || kind.prototype().property(name).is_some()
        })
    }

    /// Invoke a kind method.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let kind = self
            .kind()
            .ok_or_else(|| Error::UnknownMethod(method.to_string()))?;
        let method_fn = kind
            .prototype()
            .method(method)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod(method.to_string()))?;
        method_fn(self, args)
    }

    /// Read a kind property.
    pub fn prop(&self, name: &str) -> Result<Value> {
        let kind = self
            .kind()
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;
        let property = kind
            .prototype()
            .property(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;
        Ok(property.get(self))
    }

    /// Write a kind property.
    pub fn set_prop(&self, name: &str, value: Value) -> Result<()> {
        let kind = self
            .kind()
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;
        let property = kind
            .prototype()
            .property(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;
        property.set(self, name, value)
    }

    /// A fresh cell already claimed as a fusion result.
    pub(crate) fn new_wired() -> Self {
        let cell = Self::new();
        cell.inner.lock().flags.insert(CellFlags::WIRED);
        cell
    }

    /// Claim this cell as a fusion result.
    pub(crate) fn mark_wired(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.flags.contains(CellFlags::WIRED) {
            return Err(Error::AlreadyWired { uid: self.uid });
        }
        inner.flags.insert(CellFlags::WIRED);
        Ok(())
    }

    pub fn downgrade(&self) -> WeakCell<T> {
        WeakCell {
            uid: self.uid,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T: CellValue> Default for Cell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Cell<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl<T> Eq for Cell<T> {}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Cell")
            .field("uid", &self.uid)
            .field("id", &inner.id)
            .field("value", &inner.value)
            .field("flags", &inner.flags)
            .field(
                "listener_count",
                &inner.listeners.as_ref().map_or(0, |l| l.len()),
            )
            .finish()
    }
}

impl<T> WeakCell<T> {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn upgrade(&self) -> Option<Cell<T>> {
        self.inner.upgrade().map(|inner| Cell {
            uid: self.uid,
            inner,
        })
    }
}

impl<T> Clone for WeakCell<T> {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCell").field("uid", &self.uid).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn recorder<T: CellValue>(cell: &Cell<T>) -> (ListenerId, Arc<Mutex<Vec<T>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let id = cell.up(move |v: &T, _| log_clone.lock().push(v.clone()));
        (id, log)
    }

    #[test]
    fn new_cell_is_empty() {
        let cell: Cell<i32> = Cell::new();
        assert!(cell.is_empty());
        assert!(cell.flags().contains(CellFlags::EMPTY));
        assert_eq!(cell.value(), None);
    }

    #[test]
    fn first_write_clears_empty() {
        let cell = Cell::new();
        cell.set(5);
        assert!(!cell.is_empty());
        assert!(!cell.flags().contains(CellFlags::EMPTY));
        assert!(cell.flags().contains(CellFlags::WAS_SET));
        assert_eq!(cell.value(), Some(5));
    }

    #[test]
    fn seeded_cell_has_value() {
        let cell = Cell::with_value("hi".to_string());
        assert_eq!(cell.value().as_deref(), Some("hi"));
        assert!(!cell.is_empty());
    }

    #[test]
    fn up_delivers_current_value_immediately() {
        let cell = Cell::with_value(7);
        let (_, log) = recorder(&cell);
        assert_eq!(*log.lock(), vec![7]);
    }

    #[test]
    fn up_on_empty_cell_waits_for_write() {
        let cell = Cell::new();
        let (_, log) = recorder(&cell);
        assert!(log.lock().is_empty());
        cell.set(1);
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let cell = Cell::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            cell.up(move |_: &i32, _| order.lock().push(tag));
        }
        cell.set(1);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn listener_receives_cell_handle() {
        let cell = Cell::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let uid = cell.uid();
        cell.up(move |v: &i32, c: &Cell<i32>| {
            assert_eq!(c.uid(), uid);
            seen_clone.store(*v, Ordering::SeqCst);
        });
        cell.set(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn down_stops_notifications_and_clears_flag() {
        let cell = Cell::new();
        let (id, log) = recorder(&cell);
        assert!(cell.has_listeners());

        cell.set(1);
        assert!(cell.down(id));
        assert!(!cell.has_listeners());
        assert!(!cell.flags().contains(CellFlags::HAS_LISTENERS));

        cell.set(2);
        assert_eq!(*log.lock(), vec![1]);
        assert!(!cell.down(id));
    }

    #[test]
    fn dedup_drops_equal_writes() {
        let cell = Cell::with_options(CellOptions::new().value(1).dedup(true));
        let (_, log) = recorder(&cell);
        cell.set(1);
        cell.set(1);
        cell.set(2);
        cell.set(2);
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn without_dedup_equal_writes_notify() {
        let cell = Cell::with_value(1);
        let (_, log) = recorder(&cell);
        cell.set(1);
        assert_eq!(*log.lock(), vec![1, 1]);
    }

    #[test]
    fn pipe_transforms_and_rejects() {
        let cell = Cell::with_options(
            CellOptions::new().pipe(|v: i32| if v < 0 { None } else { Some(v * 10) }),
        );
        cell.set(2);
        assert_eq!(cell.value(), Some(20));
        cell.set(-1);
        assert_eq!(cell.value(), Some(20));
    }

    #[test]
    fn rejected_first_write_keeps_cell_empty() {
        let cell = Cell::with_options(CellOptions::new().pipe(|_: i32| None));
        cell.set(1);
        assert!(cell.is_empty());
    }

    #[test]
    fn stateless_notifies_without_retaining() {
        let cell = Cell::with_options(CellOptions::new().stateless(true));
        let (_, log) = recorder(&cell);
        cell.set(3);
        assert_eq!(*log.lock(), vec![3]);
        assert_eq!(cell.value(), None);
        assert!(!cell.is_empty());
    }

    #[test]
    fn silent_write_stores_without_notifying() {
        let cell = Cell::new();
        let (_, log) = recorder(&cell);
        cell.silent(4);
        assert_eq!(cell.value(), Some(4));
        assert!(log.lock().is_empty());
        assert!(!cell.flags().contains(CellFlags::SILENT));

        cell.set(5);
        assert_eq!(*log.lock(), vec![5]);
    }

    #[test]
    fn reentrant_write_is_ignored() {
        let cell = Cell::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        cell.up(move |v: &i32, c: &Cell<i32>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            c.set(v + 1);
        });
        cell.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.value(), Some(1));
        assert!(!cell.flags().contains(CellFlags::SETTING));

        cell.set(10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cell.value(), Some(10));
    }

    #[test]
    fn before_change_hook_cannot_write_its_own_cell() {
        let nested = Arc::new(AtomicI32::new(0));
        let nested_clone = nested.clone();
        let clamp = crate::kind::Plugin::new("clamp").on_before_change(move |c: &Cell<i32>, v: &i32| {
            if *v > 10 {
                nested_clone.fetch_add(1, Ordering::SeqCst);
                c.set(10);
            }
        });
        let registry = Arc::new(Registry::new(vec![clamp]));
        let cell = Cell::with_options(CellOptions::new().kind(registry));
        let (_, seen) = recorder(&cell);

        cell.set(11);
        assert_eq!(nested.load(Ordering::SeqCst), 1);
        assert_eq!(cell.value(), Some(11));
        assert_eq!(*seen.lock(), vec![11]);
        assert!(!cell.flags().contains(CellFlags::SETTING));

        cell.set(3);
        assert_eq!(*seen.lock(), vec![11, 3]);
    }

    #[test]
    fn removal_during_notification_affects_next_pass_only() {
        let cell = Cell::new();
        let second_calls = Arc::new(AtomicI32::new(0));
        let second_id = Arc::new(Mutex::new(None::<ListenerId>));

        let second_id_clone = second_id.clone();
        cell.up(move |_: &i32, c: &Cell<i32>| {
            if let Some(id) = *second_id_clone.lock() {
                c.down(id);
            }
        });
        let calls = second_calls.clone();
        let id = cell.up(move |_: &i32, _| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        *second_id.lock() = Some(id);

        cell.set(1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        cell.set(2);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_during_notification_joins_next_pass() {
        let cell = Cell::new();
        let late_calls = Arc::new(AtomicI32::new(0));
        let subscribed = Arc::new(AtomicI32::new(0));

        let late = late_calls.clone();
        let once = subscribed.clone();
        cell.up(move |_: &i32, c: &Cell<i32>| {
            if once.fetch_add(1, Ordering::SeqCst) == 0 {
                let late = late.clone();
                c.up(move |_, _| {
                    late.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        cell.set(1);
        // Immediate delivery from `up` only.
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
        cell.set(2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decay_resets_to_zero_state() {
        let cell = Cell::with_options(CellOptions::new().value(1).dedup(true));
        let (_, log) = recorder(&cell);
        cell.on("change", |_| {});

        cell.decay();
        assert!(cell.is_empty());
        assert_eq!(cell.flags(), CellFlags::empty());
        assert_eq!(cell.value(), None);
        assert_eq!(cell.listener_count(), 0);

        // Inert afterwards: writes succeed but nobody hears them.
        cell.set(2);
        assert_eq!(cell.value(), Some(2));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn decay_hooks_run_once() {
        let cell = Cell::with_value(1);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        cell.on_decay(move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        let removed = cell.on_decay(|_| panic!("removed hook must not run"));
        assert!(cell.off_decay(removed));

        cell.decay();
        cell.decay();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn local_change_event_fires_when_enabled() {
        let cell = Cell::with_options(CellOptions::new().emit_change(true));
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();
        let id = cell.on("change", move |c: &Cell<i32>| {
            fired_clone.store(c.value().unwrap_or_default(), Ordering::SeqCst);
        });
        assert!(cell.flags().contains(CellFlags::HAS_EVENTS));

        cell.set(6);
        assert_eq!(fired.load(Ordering::SeqCst), 6);

        assert!(cell.off("change", id));
        assert!(!cell.flags().contains(CellFlags::HAS_EVENTS));
    }

    #[test]
    fn change_event_is_quiet_when_disabled() {
        let cell = Cell::new();
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();
        cell.on("change", move |_: &Cell<i32>| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        cell.emit("change");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_aborts_pass_by_default() {
        let cell = Cell::new();
        let after = Arc::new(AtomicI32::new(0));
        cell.up(|_: &i32, _| panic!("boom"));
        let after_clone = after.clone();
        cell.up(move |_, _| {
            after_clone.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| cell.set(1)));
        assert!(outcome.is_err());
        assert_eq!(after.load(Ordering::SeqCst), 0);
        // The write guard was released despite the panic.
        assert!(!cell.flags().contains(CellFlags::SETTING));
    }

    #[test]
    fn isolated_cell_keeps_notifying_after_panic() {
        let cell = Cell::with_options(CellOptions::new().isolate(true));
        let after = Arc::new(AtomicI32::new(0));
        cell.up(|_: &i32, _| panic!("boom"));
        let after_clone = after.clone();
        cell.up(move |_, _| {
            after_clone.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_reads_current_value() {
        let cell = Cell::with_value(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.value(), Some(15));

        let empty: Cell<i32> = Cell::new();
        empty.update(|v| v + 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn clones_share_state_and_uid() {
        let a = Cell::with_value(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.value(), Some(2));
        assert_eq!(a, b);
        assert_ne!(a, Cell::with_value(2));
    }

    #[test]
    fn uids_are_monotonic() {
        let a: Cell<i32> = Cell::new();
        let b: Cell<i32> = Cell::new();
        assert!(a.uid() < b.uid());
    }

    #[test]
    fn weak_cell_upgrades_while_alive() {
        let cell = Cell::with_value(1);
        let weak = cell.downgrade();
        assert_eq!(weak.upgrade().and_then(|c| c.value()), Some(1));
        drop(cell);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn wiring_is_claimed_once() {
        let cell: Cell<i32> = Cell::new();
        assert!(cell.mark_wired().is_ok());
        assert!(matches!(
            cell.mark_wired(),
            Err(Error::AlreadyWired { uid }) if uid == cell.uid()
        ));

        let claimed: Cell<i32> = Cell::new_wired();
        assert!(claimed.is_wired());
        assert!(claimed.is_empty());
        assert!(claimed.mark_wired().is_err());
    }

    #[test]
    fn sync_getter_fetches_without_writing() {
        let cell: Cell<i32> = Cell::new();
        assert!(cell.fetch().is_none());
        cell.set_getter(|| 42);
        assert!(cell.has_getter());
        assert!(!cell.is_async());
        match cell.fetch() {
            Some(Fetch::Ready(v)) => assert_eq!(v, 42),
            other => panic!("unexpected fetch result: {other:?}"),
        }
        assert!(cell.is_empty());
    }

    #[test]
    fn calling_methods_without_kind_fails() {
        let cell = Cell::with_value(Value::Null);
        assert!(matches!(
            cell.call("push", &[]),
            Err(Error::UnknownMethod(name)) if name == "push"
        ));
        assert!(matches!(cell.prop("len"), Err(Error::UnknownProperty(_))));
        assert!(!cell.responds_to("push"));
    }
}
