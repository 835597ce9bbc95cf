//! Quanta Core
//!
//! This crate provides the core runtime for the Quanta reactive cell system.
//! It implements:
//!
//! - Reactive cells with a bit-flag state machine
//! - A kind registry that compiles plugins into per-selector prototypes
//! - Fusions: derived cells with several recomputation strategies
//! - Realm event buses with scope bubbling and cross-realm subscriptions
//!
//! Everything runs in-process and synchronously. Async values are plain
//! futures the caller drives; the crate never spawns tasks.
//!
//! # Architecture
//!
//! - `cell`: the reactive value slot and its listeners
//! - `kind`: plugins, registries and the kind catalog
//! - `fusion`: derived cells over ordered sources
//! - `bus`: realms, the realm manager and bus events
//! - `runtime`: the context object that owns the bus and kind catalogs
//!
//! # Example
//!
//! ```rust,ignore
//! use quanta_core::{fusion, Cell};
//!
//! let a = Cell::with_value(0);
//! let b = Cell::with_value(5);
//!
//! // Only propagates while every source is truthy.
//! let sum = fusion([&a, &b]).alive(|v| v[0] + v[1]);
//! assert_eq!(sum.value(), None);
//!
//! a.set(3);
//! assert_eq!(sum.value(), Some(8));
//! ```

pub mod bus;
pub mod cell;
pub mod config;
pub mod error;
pub mod fusion;
pub mod kind;
mod runtime;

pub use bus::{BusEvent, Payload, QuantumBus, Realm, RealmBus};
pub use cell::{Cell, CellFlags, CellOptions, CellValue, ListenerId, Truthy, WeakCell};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use fusion::{fusion, Fusion, FusionBuilder, Inputs, Strategy};
pub use kind::{Kinds, Plugin, Registry};
pub use runtime::Runtime;
