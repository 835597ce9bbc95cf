//! Realm Event Bus
//!
//! Realms are named event namespaces owned by a [`QuantumBus`]. A realm
//! accepts four subscription addresses:
//!
//! - `event`: that event on this realm
//! - `*`: every event on this realm
//! - `*:*`: every event on every realm of the manager
//! - `other:event`: `event` on realm `other`
//!
//! Events can also be emitted at a dot-delimited scope path. Scoped
//! emissions bubble from the given path up to its root.
//!
//! Cells use a realm only as a side channel for their wake and change
//! events; their own listeners never depend on it.

mod event;
mod manager;
mod realm;
mod scope;

pub use event::{Address, BusEvent, BusListener, Payload};
pub use manager::{CrossKey, QuantumBus};
pub use realm::{Realm, RealmBus};
pub use scope::ScopePath;
