//! Registry Compilation
//!
//! A [`Registry`] is the compiled form of an ordered plugin list:
//!
//! 1. Plugins are stably sorted by descending `order`.
//! 2. Each hook kind (create, decay, before-change) is flattened into one
//!    [`Compiled`] value: no hooks, a single hook, or a chain.
//! 3. Methods and properties are merged into one [`Prototype`]; a later
//!    plugin replaces an earlier plugin's entry of the same name.
//!
//! A registry is immutable once built. Cells hold it behind an `Arc` and
//! dispatch through it for their whole lifetime.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::cell::Cell;

use super::plugin::{BeforeChange, Hook, Method, Plugin, Property};

/// A flattened hook list.
pub enum Compiled<H> {
    Noop,
    Single(H),
    Chain(Arc<[H]>),
}

impl<H: Clone> Compiled<H> {
    fn from_hooks(mut hooks: Vec<H>) -> Self {
        match hooks.len() {
            0 => Compiled::Noop,
            1 => Compiled::Single(hooks.remove(0)),
            _ => Compiled::Chain(hooks.into()),
        }
    }
}

impl<H> Compiled<H> {
    /// Number of hooks compiled in.
    pub fn len(&self) -> usize {
        match self {
            Compiled::Noop => 0,
            Compiled::Single(_) => 1,
            Compiled::Chain(hooks) => hooks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Compiled::Noop)
    }

    fn each(&self, mut f: impl FnMut(&H)) {
        match self {
            Compiled::Noop => {}
            Compiled::Single(hook) => f(hook),
            Compiled::Chain(hooks) => hooks.iter().for_each(f),
        }
    }
}

/// Methods and properties shared by every cell of a registry.
pub struct Prototype<T> {
    methods: IndexMap<String, Method<T>>,
    properties: IndexMap<String, Property<T>>,
}

impl<T> Prototype<T> {
    pub fn method(&self, name: &str) -> Option<&Method<T>> {
        self.methods.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&Property<T>> {
        self.properties.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// A compiled kind.
pub struct Registry<T> {
    selector: Option<String>,
    plugins: Vec<Arc<Plugin<T>>>,
    create: Compiled<Hook<T>>,
    decay: Compiled<Hook<T>>,
    before_change: Compiled<BeforeChange<T>>,
    prototype: Prototype<T>,
}

impl<T> Registry<T> {
    /// Compile an ad-hoc plugin list.
    pub fn new(plugins: Vec<Plugin<T>>) -> Self {
        Self::compile(None, plugins.into_iter().map(Arc::new).collect())
    }

    pub(crate) fn compile(selector: Option<String>, mut plugins: Vec<Arc<Plugin<T>>>) -> Self {
        plugins.sort_by_key(|plugin| Reverse(plugin.priority()));

        let create = Compiled::from_hooks(
            plugins
                .iter()
                .filter_map(|p| p.create_hook().cloned())
                .collect(),
        );
        let decay = Compiled::from_hooks(
            plugins
                .iter()
                .filter_map(|p| p.decay_hook().cloned())
                .collect(),
        );
        let before_change = Compiled::from_hooks(
            plugins
                .iter()
                .filter_map(|p| p.before_change_hook().cloned())
                .collect(),
        );

        let mut methods = IndexMap::new();
        let mut properties = IndexMap::new();
        for plugin in &plugins {
            for (name, method) in plugin.methods() {
                if methods.insert(name.clone(), Arc::clone(method)).is_some() {
                    tracing::debug!(plugin = plugin.name(), method = %name, "method overridden");
                }
            }
            for (name, property) in plugin.properties() {
                if properties.insert(name.clone(), property.clone()).is_some() {
                    tracing::debug!(plugin = plugin.name(), property = %name, "property overridden");
                }
            }
        }

        tracing::debug!(
            selector = selector.as_deref().unwrap_or("<ad-hoc>"),
            plugins = plugins.len(),
            create_hooks = create.len(),
            decay_hooks = decay.len(),
            before_change_hooks = before_change.len(),
            "registry compiled"
        );

        Self {
            selector,
            plugins,
            create,
            decay,
            before_change,
            prototype: Prototype {
                methods,
                properties,
            },
        }
    }

    /// Build a new, uncached registry from this one's plugins plus `extra`.
    ///
    /// `self` is left untouched.
    pub fn extend(&self, extra: Vec<Plugin<T>>) -> Self {
        let plugins = self
            .plugins
            .iter()
            .cloned()
            .chain(extra.into_iter().map(Arc::new))
            .collect();
        Self::compile(None, plugins)
    }

    /// The selector this registry is cached under, if it came from a catalog.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Plugins in compiled (descending priority) order.
    pub fn plugins(&self) -> &[Arc<Plugin<T>>] {
        &self.plugins
    }

    pub fn prototype(&self) -> &Prototype<T> {
        &self.prototype
    }

    pub fn create_hooks(&self) -> &Compiled<Hook<T>> {
        &self.create
    }

    pub fn decay_hooks(&self) -> &Compiled<Hook<T>> {
        &self.decay
    }

    pub fn before_change_hooks(&self) -> &Compiled<BeforeChange<T>> {
        &self.before_change
    }

    pub(crate) fn on_create(&self, cell: &Cell<T>) {
        self.create.each(|hook| hook(cell));
    }

    pub(crate) fn on_decay(&self, cell: &Cell<T>) {
        self.decay.each(|hook| hook(cell));
    }

    pub(crate) fn before_change(&self, cell: &Cell<T>, value: &T) {
        self.before_change.each(|hook| hook(cell, value));
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("selector", &self.selector)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("methods", &self.prototype.method_names().collect::<Vec<_>>())
            .field(
                "properties",
                &self.prototype.property_names().collect::<Vec<_>>(),
            )
            .finish()
    }
}
