//! Runtime
//!
//! The runtime is the context object that owns the process-wide pieces of
//! the system:
//!
//! - the [`QuantumBus`] and therefore every realm
//! - one [`Kinds`] catalog per value type
//! - the [`RuntimeConfig`] new cells are seeded from
//!
//! Tests and embedders create their own runtime and pass it around, so
//! nothing leaks between them. Callers that do not care can use
//! [`Runtime::global`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;

use crate::bus::{QuantumBus, Realm};
use crate::cell::{Cell, CellOptions, CellValue};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::kind::{builtin, Kinds};

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Owner of the bus, the kind catalogs and the configuration.
pub struct Runtime {
    config: RuntimeConfig,
    bus: Arc<QuantumBus>,
    // Values are `Arc<Kinds<T>>` keyed by `TypeId::of::<T>()`.
    kinds: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        tracing::debug!(?config, "runtime created");
        Self {
            config,
            bus: QuantumBus::new(),
            kinds: Mutex::new(HashMap::new()),
        }
    }

    /// Build a runtime from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_config(RuntimeConfig::from_json(json)?))
    }

    /// The lazily created process-wide runtime.
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(Runtime::new)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<QuantumBus> {
        &self.bus
    }

    /// Get or create a realm.
    pub fn realm(&self, name: &str) -> Realm {
        self.bus.realm(name)
    }

    /// The kind catalog for cells holding `T`.
    pub fn kinds<T: CellValue>(&self) -> Arc<Kinds<T>> {
        let mut kinds = self.kinds.lock();
        if let Some(existing) = kinds.get(&TypeId::of::<T>()) {
            if let Ok(catalog) = Arc::clone(existing).downcast::<Kinds<T>>() {
                return catalog;
            }
        }
        let catalog = Arc::new(Kinds::<T>::new());
        kinds.insert(TypeId::of::<T>(), catalog.clone());
        tracing::debug!(kind_type = std::any::type_name::<T>(), "kind catalog created");
        catalog
    }

    /// The catalog for JSON cells, with the built-in kinds installed.
    pub fn json_kinds(&self) -> Result<Arc<Kinds<Value>>> {
        let catalog = self.kinds::<Value>();
        if !catalog.is_defined(builtin::ARRAY) {
            builtin::install(&catalog)?;
        }
        Ok(catalog)
    }

    /// Cell options seeded from the configuration.
    pub fn options<T>(&self) -> CellOptions<T> {
        CellOptions {
            dedup: self.config.dedup_by_default,
            isolate: self.config.isolate_listeners,
            emit_change: self.config.emit_change_events,
            wake_suffix: self.config.wake_event_suffix.clone(),
            change_event: self.config.change_event.clone(),
            ..CellOptions::default()
        }
    }

    pub fn cell<T: CellValue>(&self, options: CellOptions<T>) -> Cell<T> {
        Cell::with_options(options)
    }

    /// A cell with the configured defaults, attached to realm `realm` under
    /// `id`.
    pub fn realm_cell<T: CellValue>(&self, realm: &str, id: &str) -> Cell<T> {
        self.cell(self.options().realm(self.realm(realm)).id(id))
    }

    /// Drop every realm and every kind catalog.
    ///
    /// Cells and registries already handed out keep working; they are just
    /// no longer reachable from this runtime.
    pub fn teardown(&self) {
        self.bus.clear();
        self.kinds.lock().clear();
        tracing::debug!("runtime torn down");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
