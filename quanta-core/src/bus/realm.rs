//! A single realm: local, wildcard and scoped listeners.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::cell::ListenerId;
use crate::error::Result;

use super::event::{Address, BusEvent, BusListener, Payload};
use super::manager::QuantumBus;
use super::scope::ScopePath;

/// Shared handle to a realm.
pub type Realm = Arc<RealmBus>;

#[derive(Clone)]
struct Entry {
    listener: BusListener,
    once: bool,
}

type Slot = IndexMap<ListenerId, Entry>;

#[derive(Default)]
struct RealmState {
    events: IndexMap<String, Slot>,
    /// Listener count per event, updated together with `events`.
    counts: IndexMap<String, usize>,
    scopes: IndexMap<String, IndexMap<String, Slot>>,
    wildcard: Slot,
}

impl RealmState {
    fn insert(&mut self, event: &str, id: ListenerId, entry: Entry) {
        self.events
            .entry(event.to_string())
            .or_default()
            .insert(id, entry);
        *self.counts.entry(event.to_string()).or_insert(0) += 1;
    }

    fn remove(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(slot) = self.events.get_mut(event) else {
            return false;
        };
        if slot.shift_remove(&id).is_none() {
            return false;
        }
        if slot.is_empty() {
            self.events.shift_remove(event);
            self.counts.shift_remove(event);
        } else if let Some(count) = self.counts.get_mut(event) {
            *count -= 1;
        }
        true
    }

    /// Snapshot the listeners of `event`, dropping `once` entries.
    fn take_local(&mut self, event: &str) -> Vec<(ListenerId, BusListener)> {
        let snapshot = snapshot(self.events.get(event));
        for (id, once) in snapshot.iter().map(|(id, entry)| (*id, entry.once)) {
            if once {
                self.remove(event, id);
            }
        }
        snapshot
            .into_iter()
            .map(|(id, entry)| (id, entry.listener))
            .collect()
    }

    fn insert_scoped(&mut self, path: &ScopePath, event: &str, id: ListenerId, entry: Entry) {
        self.scopes
            .entry(path.to_string())
            .or_default()
            .entry(event.to_string())
            .or_default()
            .insert(id, entry);
    }

    fn remove_scoped(&mut self, path: &str, event: &str, id: ListenerId) -> bool {
        let Some(events) = self.scopes.get_mut(path) else {
            return false;
        };
        let Some(slot) = events.get_mut(event) else {
            return false;
        };
        let removed = slot.shift_remove(&id).is_some();
        if slot.is_empty() {
            events.shift_remove(event);
        }
        if events.is_empty() {
            self.scopes.shift_remove(path);
        }
        removed
    }

    /// Snapshot the scoped listeners of `event` at `path`, dropping `once`
    /// entries.
    fn take_scoped(&mut self, path: &str, event: &str) -> Vec<(ListenerId, BusListener)> {
        let snapshot = snapshot(self.scopes.get(path).and_then(|events| events.get(event)));
        for (id, once) in snapshot.iter().map(|(id, entry)| (*id, entry.once)) {
            if once {
                self.remove_scoped(path, event, id);
            }
        }
        snapshot
            .into_iter()
            .map(|(id, entry)| (id, entry.listener))
            .collect()
    }
}

fn snapshot(slot: Option<&Slot>) -> Vec<(ListenerId, Entry)> {
    slot.map(|slot| slot.iter().map(|(id, entry)| (*id, entry.clone())).collect())
        .unwrap_or_default()
}

/// A named event namespace.
///
/// Realms are normally obtained from [`QuantumBus::realm`]; a realm created
/// with [`RealmBus::detached`] has no manager, so cross-realm and `*:*`
/// subscriptions on it are ignored.
pub struct RealmBus {
    name: String,
    manager: Weak<QuantumBus>,
    state: Mutex<RealmState>,
}

impl RealmBus {
    pub(crate) fn new(name: &str, manager: Weak<QuantumBus>) -> Realm {
        Arc::new(Self {
            name: name.to_string(),
            manager,
            state: Mutex::new(RealmState::default()),
        })
    }

    /// A realm that belongs to no manager.
    pub fn detached(name: &str) -> Realm {
        Self::new(name, Weak::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe by address: `event`, `*`, `*:*` or `realm:event`.
    pub fn on<F>(&self, address: &str, listener: F) -> ListenerId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        let listener: BusListener = Arc::new(listener);
        match Address::parse(address) {
            Address::Local(event) => self.state.lock().insert(
                event,
                id,
                Entry {
                    listener,
                    once: false,
                },
            ),
            Address::Realm => {
                self.state.lock().wildcard.insert(
                    id,
                    Entry {
                        listener,
                        once: false,
                    },
                );
            }
            Address::Global => match self.manager.upgrade() {
                Some(manager) => manager.insert_global(id, listener),
                None => tracing::warn!(realm = %self.name, "detached realm ignores *:* subscription"),
            },
            Address::Cross { realm, event } => match self.manager.upgrade() {
                Some(manager) => manager.subscribe_cross(&self.name, realm, event, id, listener),
                None => tracing::warn!(realm = %self.name, %address, "detached realm ignores cross-realm subscription"),
            },
        }
        tracing::trace!(realm = %self.name, %address, "listener added");
        id
    }

    /// Subscribe to a plain event name. Colons are not interpreted, so this
    /// is how `"<id>:AWAKE"` style events are observed.
    pub fn on_local<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.state.lock().insert(
            event,
            id,
            Entry {
                listener: Arc::new(listener),
                once: false,
            },
        );
        id
    }

    /// Subscribe to the next occurrence of a plain event only.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.state.lock().insert(
            event,
            id,
            Entry {
                listener: Arc::new(listener),
                once: true,
            },
        );
        id
    }

    /// Remove a subscription made with [`on`](Self::on) under `address`.
    pub fn off(&self, address: &str, id: ListenerId) -> bool {
        match Address::parse(address) {
            Address::Local(event) => self.off_local(event, id),
            Address::Realm => self.state.lock().wildcard.shift_remove(&id).is_some(),
            Address::Global => self
                .manager
                .upgrade()
                .is_some_and(|manager| manager.off_global(id)),
            Address::Cross { realm, event } => self
                .manager
                .upgrade()
                .is_some_and(|manager| manager.unsubscribe_cross(&self.name, realm, event, id)),
        }
    }

    pub fn off_local(&self, event: &str, id: ListenerId) -> bool {
        self.state.lock().remove(event, id)
    }

    /// Subscribe to `event` emitted at `path` or any scope below it.
    pub fn on_scope<F>(&self, path: &str, event: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.scoped(path, event, Arc::new(listener), false)
    }

    /// Like [`on_scope`](Self::on_scope), for the next matching emission only.
    pub fn once_scope<F>(&self, path: &str, event: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.scoped(path, event, Arc::new(listener), true)
    }

    fn scoped(&self, path: &str, event: &str, listener: BusListener, once: bool) -> Result<ListenerId> {
        let path = ScopePath::parse(path)?;
        let id = ListenerId::new();
        self.state
            .lock()
            .insert_scoped(&path, event, id, Entry { listener, once });
        Ok(id)
    }

    pub fn off_scope(&self, path: &str, event: &str, id: ListenerId) -> bool {
        self.state.lock().remove_scoped(path, event, id)
    }

    /// Whether anything listens for `event` exactly at `path`.
    pub fn has_scope_listeners(&self, path: &str, event: &str) -> bool {
        self.state
            .lock()
            .scopes
            .get(path)
            .is_some_and(|events| events.contains_key(event))
    }

    /// Emit `event`: local listeners, then `*`, then cross-realm
    /// subscribers, then `*:*`.
    pub fn emit<D: Any + Send + Sync>(&self, event: &str, data: D) {
        self.emit_payload(event, Payload::new(data));
    }

    pub fn emit_payload(&self, event: &str, data: Payload) {
        let (local, wildcard) = {
            let mut state = self.state.lock();
            let local = state.take_local(event);
            let wildcard = snapshot(Some(&state.wildcard));
            (local, wildcard)
        };
        tracing::trace!(
            realm = %self.name,
            event,
            local = local.len(),
            wildcard = wildcard.len(),
            "emit"
        );

        let plain = BusEvent::new(event, data);
        for (_, listener) in &local {
            listener(&plain);
        }
        let tagged = plain.in_realm(&self.name);
        for (_, entry) in &wildcard {
            (entry.listener)(&tagged);
        }
        if let Some(manager) = self.manager.upgrade() {
            manager.deliver_cross(&self.name, &tagged);
            manager.deliver_global(&tagged);
        }
    }

    /// Emit `event` at scope `path`, bubbling to the root.
    ///
    /// Scope listeners run most specific first, then this realm's plain
    /// listeners for `event`, then `*`. Every listener runs at most once.
    /// Cross-realm and `*:*` subscribers are not notified.
    pub fn emit_in_scope<D: Any + Send + Sync>(&self, path: &str, event: &str, data: D) -> Result<()> {
        let path = ScopePath::parse(path)?;
        let ordered = {
            let mut state = self.state.lock();
            let mut ordered: Vec<(ListenerId, BusListener)> = Vec::new();
            for level in path.ancestors() {
                ordered.extend(state.take_scoped(level, event));
            }
            ordered.extend(state.take_local(event));
            ordered.extend(
                state
                    .wildcard
                    .iter()
                    .map(|(id, entry)| (*id, Arc::clone(&entry.listener))),
            );
            ordered
        };

        let bus_event = BusEvent {
            event: event.to_string(),
            data: Payload::new(data),
            realm: Some(self.name.clone()),
            scope: Some(path.to_string()),
        };
        let mut fired = HashSet::with_capacity(ordered.len());
        for (id, listener) in ordered {
            if fired.insert(id) {
                listener(&bus_event);
            }
        }
        Ok(())
    }

    /// Whether any plain listener is registered for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.state.lock().counts.get(event).is_some_and(|count| *count > 0)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state.lock().counts.get(event).copied().unwrap_or(0)
    }

    pub fn wildcard_count(&self) -> usize {
        self.state.lock().wildcard.len()
    }

    /// Drop every local, wildcard and scope listener.
    pub fn clear(&self) {
        *self.state.lock() = RealmState::default();
        tracing::debug!(realm = %self.name, "realm cleared");
    }

    /// Clear the realm, drop the cross-realm subscriptions it made and
    /// remove it from its manager.
    pub fn decay(&self) {
        self.clear();
        if let Some(manager) = self.manager.upgrade() {
            manager.drop_subscriber(&self.name);
            manager.remove_realm(&self.name);
        }
        tracing::debug!(realm = %self.name, "realm decayed");
    }
}

impl fmt::Debug for RealmBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RealmBus")
            .field("name", &self.name)
            .field("events", &state.counts)
            .field("scopes", &state.scopes.len())
            .field("wildcard", &state.wildcard.len())
            .finish()
    }
}
