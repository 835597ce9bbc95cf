//! The realm manager: realm lookup, cross-realm and `*:*` subscriptions.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::cell::ListenerId;

use super::event::{BusEvent, BusListener};
use super::realm::{Realm, RealmBus};

/// A cross-realm subscription: `subscriber` listening to `event` on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossKey {
    pub subscriber: String,
    pub target: String,
    pub event: String,
}

impl fmt::Display for CrossKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.subscriber, self.target, self.event)
    }
}

/// Owner of every realm in a runtime.
pub struct QuantumBus {
    me: Weak<QuantumBus>,
    realms: DashMap<String, Realm>,
    cross: Mutex<IndexMap<CrossKey, IndexMap<ListenerId, BusListener>>>,
    global: Mutex<IndexMap<ListenerId, BusListener>>,
}

impl QuantumBus {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            realms: DashMap::new(),
            cross: Mutex::new(IndexMap::new()),
            global: Mutex::new(IndexMap::new()),
        })
    }

    /// Get the realm called `name`, creating it on first use.
    pub fn realm(&self, name: &str) -> Realm {
        if let Some(realm) = self.realms.get(name) {
            return Arc::clone(realm.value());
        }
        let realm = self
            .realms
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(realm = name, "realm created");
                RealmBus::new(name, self.me.clone())
            });
        Arc::clone(realm.value())
    }

    pub fn get_realm(&self, name: &str) -> Option<Realm> {
        self.realms.get(name).map(|realm| Arc::clone(realm.value()))
    }

    pub fn has_realm(&self, name: &str) -> bool {
        self.realms.contains_key(name)
    }

    /// Realm names, sorted.
    pub fn realm_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.realms.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Forget a realm. Existing handles keep working but are no longer
    /// reachable through this manager.
    pub fn remove_realm(&self, name: &str) -> Option<Realm> {
        self.realms.remove(name).map(|(_, realm)| realm)
    }

    /// Subscribe to every event of every realm.
    pub fn on_global<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.insert_global(id, Arc::new(listener));
        id
    }

    pub fn off_global(&self, id: ListenerId) -> bool {
        self.global.lock().shift_remove(&id).is_some()
    }

    pub fn global_count(&self) -> usize {
        self.global.lock().len()
    }

    /// Every cross-realm subscription as `subscriber:target:event`.
    pub fn cross_subscription_keys(&self) -> Vec<String> {
        self.cross.lock().keys().map(CrossKey::to_string).collect()
    }

    /// Clear and forget every realm and drop all manager-level listeners.
    pub fn clear(&self) {
        let realms: Vec<Realm> = self.realms.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.realms.clear();
        for realm in realms {
            realm.clear();
        }
        self.cross.lock().clear();
        self.global.lock().clear();
        tracing::debug!("bus cleared");
    }

    pub(crate) fn insert_global(&self, id: ListenerId, listener: BusListener) {
        self.global.lock().insert(id, listener);
    }

    pub(crate) fn subscribe_cross(
        &self,
        subscriber: &str,
        target: &str,
        event: &str,
        id: ListenerId,
        listener: BusListener,
    ) {
        let key = CrossKey {
            subscriber: subscriber.to_string(),
            target: target.to_string(),
            event: event.to_string(),
        };
        tracing::trace!(%key, "cross-realm subscription");
        self.cross.lock().entry(key).or_default().insert(id, listener);
    }

    /// Remove one listener from exactly `(subscriber, target, event)`.
    pub(crate) fn unsubscribe_cross(
        &self,
        subscriber: &str,
        target: &str,
        event: &str,
        id: ListenerId,
    ) -> bool {
        let key = CrossKey {
            subscriber: subscriber.to_string(),
            target: target.to_string(),
            event: event.to_string(),
        };
        let mut cross = self.cross.lock();
        let Some(listeners) = cross.get_mut(&key) else {
            return false;
        };
        let removed = listeners.shift_remove(&id).is_some();
        if listeners.is_empty() {
            cross.shift_remove(&key);
        }
        removed
    }

    /// Drop every cross-realm subscription made by `subscriber`.
    pub(crate) fn drop_subscriber(&self, subscriber: &str) {
        self.cross
            .lock()
            .retain(|key, _| key.subscriber != subscriber);
    }

    pub(crate) fn deliver_cross(&self, target: &str, event: &BusEvent) {
        let listeners: Vec<BusListener> = self
            .cross
            .lock()
            .iter()
            .filter(|(key, _)| key.target == target && key.event == event.event)
            .flat_map(|(_, listeners)| listeners.values().cloned())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn deliver_global(&self, event: &BusEvent) {
        let listeners: Vec<BusListener> = self.global.lock().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for QuantumBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantumBus")
            .field("realms", &self.realm_names())
            .field("cross", &self.cross_subscription_keys())
            .field("global", &self.global_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, impl Fn(&BusEvent) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = hits.clone();
        (hits, move |_: &BusEvent| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn realm_is_get_or_create() {
        let bus = QuantumBus::new();
        assert!(!bus.has_realm("ui"));
        let first = bus.realm("ui");
        let second = bus.realm("ui");
        assert!(Arc::ptr_eq(&first, &second));
        bus.realm("auth");
        assert_eq!(bus.realm_names(), vec!["auth", "ui"]);
        assert!(bus.get_realm("missing").is_none());
    }

    #[test]
    fn cross_realm_delivery() {
        let bus = QuantumBus::new();
        let ui = bus.realm("ui");
        let auth = bus.realm("auth");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        ui.on("auth:login", move |e| {
            seen_clone.lock().push((e.realm.clone(), *e.data::<i32>().unwrap()));
        });
        assert_eq!(bus.cross_subscription_keys(), vec!["ui:auth:login"]);

        auth.emit("login", 7_i32);
        auth.emit("logout", 8_i32);
        ui.emit("login", 9_i32);
        assert_eq!(*seen.lock(), vec![(Some("auth".to_string()), 7)]);
    }

    #[test]
    fn cross_unsubscribe_is_exact() {
        let bus = QuantumBus::new();
        let a = bus.realm("a");
        let b = bus.realm("b");
        let target = bus.realm("target");
        let (a_hits, a_listener) = counter();
        let (b_hits, b_listener) = counter();
        let a_id = a.on("target:event", a_listener);
        b.on("target:event", b_listener);

        assert!(a.off("target:event", a_id));
        assert!(!b.off("target:event", a_id));
        target.emit("event", ());

        assert_eq!(a_hits.load(Ordering::SeqCst), 0);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.cross_subscription_keys(), vec!["b:target:event"]);
    }

    #[test]
    fn global_wildcard_sees_every_realm() {
        let bus = QuantumBus::new();
        let (hits, listener) = counter();
        let id = bus.realm("ui").on("*:*", listener);
        bus.realm("auth").emit("x", ());
        bus.realm("ui").emit("y", ());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(bus.off_global(id));
        bus.realm("ui").emit("z", ());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_order_across_categories() {
        let bus = QuantumBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = |tag: &'static str| {
            let log = log.clone();
            move |_: &BusEvent| log.lock().push(tag)
        };
        let source = bus.realm("source");
        bus.on_global(push("global"));
        bus.realm("watcher").on("source:tick", push("cross"));
        source.on("*", push("wildcard"));
        source.on("tick", push("local"));

        source.emit("tick", ());
        assert_eq!(*log.lock(), vec!["local", "wildcard", "cross", "global"]);
    }

    #[test]
    fn realm_decay_detaches_it() {
        let bus = QuantumBus::new();
        let ui = bus.realm("ui");
        bus.realm("other");
        ui.on("other:ping", |_| {});
        ui.on("ping", |_| {});
        ui.decay();
        assert!(!bus.has_realm("ui"));
        assert!(bus.cross_subscription_keys().is_empty());
        assert!(!ui.has_listeners("ping"));
    }

    #[test]
    fn clear_forgets_everything() {
        let bus = QuantumBus::new();
        bus.realm("ui").on("auth:login", |_| {});
        bus.on_global(|_| {});
        bus.clear();
        assert!(bus.realm_names().is_empty());
        assert!(bus.cross_subscription_keys().is_empty());
        assert_eq!(bus.global_count(), 0);
    }
}
