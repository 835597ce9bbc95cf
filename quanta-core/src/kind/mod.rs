//! Kinds
//!
//! A kind is a named bundle of plugins compiled into a [`Registry`]: one
//! dispatch table of lifecycle hooks, methods and properties that a cell
//! selects once at construction.
//!
//! # Selectors
//!
//! Kinds are looked up by selector, a whitespace-separated list of kind
//! names. `"A B"` merges the plugins of `A` and `B`. Merged behaviour does
//! not depend on order (plugins are sorted by priority), but the compiled
//! registry is cached under the literal selector string.
//!
//! # Extension
//!
//! [`Registry::extend`] and [`Kinds::extend_registry`] build a one-off
//! registry from an existing one plus extra plugins. The result is never
//! cached and the base registry is not modified.

pub mod builtin;
mod catalog;
mod plugin;
mod registry;

pub use catalog::Kinds;
pub use plugin::{BeforeChange, Hook, Method, Plugin, Property};
pub use registry::{Compiled, Prototype, Registry};
