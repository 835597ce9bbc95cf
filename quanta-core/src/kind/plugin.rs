//! Plugins: the unit a kind is assembled from.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::cell::Cell;
use crate::error::{Error, Result};

/// Lifecycle hook run with the cell being created or decayed.
pub type Hook<T> = Arc<dyn Fn(&Cell<T>) + Send + Sync>;

/// Hook run with the incoming value before it is stored.
pub type BeforeChange<T> = Arc<dyn Fn(&Cell<T>, &T) + Send + Sync>;

/// A method exposed on cells of a kind.
pub type Method<T> = Arc<dyn Fn(&Cell<T>, &[Value]) -> Result<Value> + Send + Sync>;

type PropertyGetter<T> = Arc<dyn Fn(&Cell<T>) -> Value + Send + Sync>;
type PropertySetter<T> = Arc<dyn Fn(&Cell<T>, Value) -> Result<()> + Send + Sync>;

/// A computed property exposed on cells of a kind.
pub struct Property<T> {
    getter: PropertyGetter<T>,
    setter: Option<PropertySetter<T>>,
}

impl<T> Property<T> {
    pub fn get(&self, cell: &Cell<T>) -> Value {
        (self.getter)(cell)
    }

    /// Run the setter; `name` is only used for the read-only error.
    pub fn set(&self, cell: &Cell<T>, name: &str, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(cell, value),
            None => Err(Error::ReadOnlyProperty(name.to_string())),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            getter: Arc::clone(&self.getter),
            setter: self.setter.clone(),
        }
    }
}

/// A named bundle of hooks, methods and properties.
///
/// Plugins with a higher `order` are compiled first. Hooks of all plugins
/// compose; for methods and properties the last plugin in compiled order
/// wins.
///
/// ```rust,ignore
/// let audit = Plugin::new("audit")
///     .order(10)
///     .on_create(|cell| tracing::info!(uid = cell.uid(), "created"))
///     .method("double", |cell, _| { ... });
/// ```
pub struct Plugin<T> {
    name: String,
    order: i32,
    on_create: Option<Hook<T>>,
    on_decay: Option<Hook<T>>,
    on_before_change: Option<BeforeChange<T>>,
    methods: IndexMap<String, Method<T>>,
    properties: IndexMap<String, Property<T>>,
}

impl<T> Plugin<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            on_create: None,
            on_decay: None,
            on_before_change: None,
            methods: IndexMap::new(),
            properties: IndexMap::new(),
        }
    }

    /// Priority; higher runs earlier. Defaults to 0.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn on_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Cell<T>) + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(hook));
        self
    }

    pub fn on_decay<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Cell<T>) + Send + Sync + 'static,
    {
        self.on_decay = Some(Arc::new(hook));
        self
    }

    pub fn on_before_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Cell<T>, &T) + Send + Sync + 'static,
    {
        self.on_before_change = Some(Arc::new(hook));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Cell<T>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    /// Add a read-only property.
    pub fn property<G>(mut self, name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&Cell<T>) -> Value + Send + Sync + 'static,
    {
        self.properties.insert(
            name.into(),
            Property {
                getter: Arc::new(getter),
                setter: None,
            },
        );
        self
    }

    pub fn property_with_setter<G, S>(mut self, name: impl Into<String>, getter: G, setter: S) -> Self
    where
        G: Fn(&Cell<T>) -> Value + Send + Sync + 'static,
        S: Fn(&Cell<T>, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.properties.insert(
            name.into(),
            Property {
                getter: Arc::new(getter),
                setter: Some(Arc::new(setter)),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.order
    }

    pub(crate) fn create_hook(&self) -> Option<&Hook<T>> {
        self.on_create.as_ref()
    }

    pub(crate) fn decay_hook(&self) -> Option<&Hook<T>> {
        self.on_decay.as_ref()
    }

    pub(crate) fn before_change_hook(&self) -> Option<&BeforeChange<T>> {
        self.on_before_change.as_ref()
    }

    pub(crate) fn methods(&self) -> &IndexMap<String, Method<T>> {
        &self.methods
    }

    pub(crate) fn properties(&self) -> &IndexMap<String, Property<T>> {
        &self.properties
    }
}

impl<T> fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}
