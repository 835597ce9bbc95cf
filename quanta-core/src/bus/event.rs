//! Bus events, payloads and subscription addresses.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable event payload.
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<D: Any + Send + Sync>(data: D) -> Self {
        Self(Arc::new(data))
    }

    /// Borrow the payload as `D`, if that is what it holds.
    pub fn downcast_ref<D: Any>(&self) -> Option<&D> {
        self.0.downcast_ref::<D>()
    }

    pub fn is<D: Any>(&self) -> bool {
        self.0.is::<D>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// What a bus listener receives.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub event: String,
    pub data: Payload,
    /// The emitting realm. Absent for events delivered to local listeners.
    pub realm: Option<String>,
    /// The scope path for scoped emissions.
    pub scope: Option<String>,
}

impl BusEvent {
    pub(crate) fn new(event: &str, data: Payload) -> Self {
        Self {
            event: event.to_string(),
            data,
            realm: None,
            scope: None,
        }
    }

    pub(crate) fn in_realm(&self, realm: &str) -> Self {
        Self {
            realm: Some(realm.to_string()),
            ..self.clone()
        }
    }

    /// Shorthand for `self.data.downcast_ref()`.
    pub fn data<D: Any>(&self) -> Option<&D> {
        self.data.downcast_ref()
    }
}

/// A bus listener.
pub type BusListener = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// The target of an `on`/`off` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address<'a> {
    /// An event of this realm.
    Local(&'a str),
    /// `*`: every event of this realm.
    Realm,
    /// `*:*`: every event of every realm.
    Global,
    /// `realm:event`: an event of another realm.
    Cross { realm: &'a str, event: &'a str },
}

impl<'a> Address<'a> {
    pub fn parse(address: &'a str) -> Self {
        match address {
            "*" => Address::Realm,
            "*:*" => Address::Global,
            _ => match address.split_once(':') {
                Some((realm, event)) if !realm.is_empty() && !event.is_empty() => {
                    Address::Cross { realm, event }
                }
                _ => Address::Local(address),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_forms() {
        assert_eq!(Address::parse("saved"), Address::Local("saved"));
        assert_eq!(Address::parse("*"), Address::Realm);
        assert_eq!(Address::parse("*:*"), Address::Global);
        assert_eq!(
            Address::parse("auth:login"),
            Address::Cross {
                realm: "auth",
                event: "login"
            }
        );
        assert_eq!(Address::parse(":odd"), Address::Local(":odd"));
    }

    #[test]
    fn payload_downcast() {
        let payload = Payload::new(42_i32);
        assert_eq!(payload.downcast_ref::<i32>(), Some(&42));
        assert!(payload.downcast_ref::<String>().is_none());
        assert!(payload.is::<i32>());
    }
}
