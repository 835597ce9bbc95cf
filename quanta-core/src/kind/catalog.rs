//! Kind Catalog
//!
//! Maps kind names to raw plugin lists and caches compiled registries by
//! selector. A selector is a whitespace-separated list of kind names; the
//! cache key is the literal selector string, so `"A B"` and `"B A"` are two
//! entries even though they merge the same plugins.
//!
//! # Redefinition
//!
//! Cells keep the registry they were built with. Redefining a kind after it
//! has been compiled would leave those cells on stale behaviour, so
//! [`Kinds::define_kind`] refuses it with [`Error::KindSealed`].

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::plugin::Plugin;
use super::registry::Registry;

/// Named plugin lists plus the compiled-registry cache.
pub struct Kinds<T> {
    raw: RwLock<IndexMap<String, Vec<Arc<Plugin<T>>>>>,
    compiled: DashMap<String, Arc<Registry<T>>>,
    /// Kind names that appear in any registry ever compiled.
    sealed: RwLock<HashSet<String>>,
}

impl<T> Kinds<T> {
    pub fn new() -> Self {
        Self {
            raw: RwLock::new(IndexMap::new()),
            compiled: DashMap::new(),
            sealed: RwLock::new(HashSet::new()),
        }
    }

    /// Register `plugins` under `name`.
    pub fn define_kind(&self, name: &str, plugins: Vec<Plugin<T>>) -> Result<()> {
        if self.sealed.read().contains(name) {
            tracing::warn!(kind = name, "refusing to redefine a compiled kind");
            return Err(Error::KindSealed(name.to_string()));
        }

        self.raw.write().insert(
            name.to_string(),
            plugins.into_iter().map(Arc::new).collect(),
        );
        self.compiled
            .retain(|selector, _| !selector.split_whitespace().any(|token| token == name));
        tracing::debug!(kind = name, "kind defined");
        Ok(())
    }

    /// Register several kinds at once. Stops at the first refused name.
    pub fn setup_nuclear_kinds<I, S>(&self, kinds: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Vec<Plugin<T>>)>,
        S: AsRef<str>,
    {
        for (name, plugins) in kinds {
            self.define_kind(name.as_ref(), plugins)?;
        }
        Ok(())
    }

    /// Compile (or fetch from cache) the registry for `selector`.
    pub fn registry_for_kind(&self, selector: &str) -> Result<Arc<Registry<T>>> {
        if let Some(cached) = self.compiled.get(selector) {
            return Ok(Arc::clone(cached.value()));
        }

        let plugins = {
            let raw = self.raw.read();
            let mut plugins = Vec::new();
            for token in selector.split_whitespace() {
                let kind = raw
                    .get(token)
                    .ok_or_else(|| Error::UnknownKind(token.to_string()))?;
                plugins.extend(kind.iter().cloned());
            }
            plugins
        };

        let registry = Arc::new(Registry::compile(Some(selector.to_string()), plugins));
        self.sealed
            .write()
            .extend(selector.split_whitespace().map(str::to_string));

        let cached = Arc::clone(
            self.compiled
                .entry(selector.to_string())
                .or_insert(registry)
                .value(),
        );
        Ok(cached)
    }

    /// Join kind names into a selector.
    pub fn combine_kinds(names: &[&str]) -> String {
        names.join(" ")
    }

    /// A fresh registry from `base` plus `extra`; the cache is not touched.
    pub fn extend_registry(base: &Registry<T>, extra: Vec<Plugin<T>>) -> Arc<Registry<T>> {
        Arc::new(base.extend(extra))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.raw.read().contains_key(name)
    }

    pub fn is_compiled(&self, selector: &str) -> bool {
        self.compiled.contains_key(selector)
    }

    /// Defined kind names in definition order.
    pub fn kind_names(&self) -> Vec<String> {
        self.raw.read().keys().cloned().collect()
    }

    pub fn cached_selectors(&self) -> Vec<String> {
        self.compiled.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Forget every kind and compiled registry.
    pub fn clear(&self) {
        self.raw.write().clear();
        self.compiled.clear();
        self.sealed.write().clear();
    }
}

impl<T> Default for Kinds<T> {
    fn default() -> Self {
        Self::new()
    }
}
