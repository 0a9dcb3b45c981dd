//! Model types and their registry
//!
//! A [`Model`] tells the mapper where a type lives, how its fields are
//! filtered and how it reacts to reserved lifecycle events. Models are
//! registered by name in a [`ModelRegistry`] so that typed references can be
//! resolved back to their collection.
//!
//! [`ModelDef`] covers the common case of a model described entirely by
//! data and closures.

use crate::filter::{Filterable, Rejection};
use crate::hooks::{Event, HookPayload};
use docmap_core::{Error, Namespace, Result, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A persisted type
pub trait Model: Filterable + Send + Sync {
    /// Type name recorded in static and dynamic references
    fn type_name(&self) -> &str;

    /// Collection holding the documents; lowercase type name by default
    fn collection(&self) -> String {
        self.type_name().to_lowercase()
    }

    /// Database holding the collection; the mapper default when `None`
    fn database(&self) -> Option<String> {
        None
    }

    /// Instance hook for the reserved events
    fn on_event(&self, event: Event, payload: &mut HookPayload<'_>) -> Result<()> {
        let _ = (event, payload);
        Ok(())
    }
}

/// Namespace of `model`, using `default_database` when it names none
pub fn namespace_for(model: &dyn Model, default_database: &str) -> Namespace {
    Namespace::new(
        model.database().unwrap_or_else(|| default_database.to_string()),
        model.collection(),
    )
}

type FieldFilter =
    Arc<dyn Fn(Value, Option<&Value>) -> std::result::Result<Value, Rejection> + Send + Sync>;
type InstanceHook = Arc<dyn Fn(&mut HookPayload<'_>) -> Result<()> + Send + Sync>;

/// Data-driven model definition
///
/// ```
/// use docmap_engine::{ModelDef, Rejection};
/// use docmap_core::Value;
///
/// let user = ModelDef::new("User")
///     .with_collection("users")
///     .with_filter("email", |v, _past| match v {
///         Value::String(s) if s.contains('@') => Ok(Value::from(s.to_lowercase())),
///         _ => Err(Rejection::new("invalid email")),
///     });
/// ```
#[derive(Clone)]
pub struct ModelDef {
    name: String,
    collection: Option<String>,
    database: Option<String>,
    filters: HashMap<String, FieldFilter>,
    hooks: HashMap<Event, Vec<InstanceHook>>,
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut filtered: Vec<&String> = self.filters.keys().collect();
        filtered.sort();
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("database", &self.database)
            .field("filters", &filtered)
            .finish()
    }
}

impl ModelDef {
    /// Model named `name`
    pub fn new(name: impl Into<String>) -> Self {
        ModelDef {
            name: name.into(),
            collection: None,
            database: None,
            filters: HashMap::new(),
            hooks: HashMap::new(),
        }
    }

    /// Override the collection name
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Pin the model to a database
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Register the filter for a top-level field, replacing any previous one
    pub fn with_filter<F>(mut self, field: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Value, Option<&Value>) -> std::result::Result<Value, Rejection> + Send + Sync + 'static,
    {
        self.filters.insert(field.into(), Arc::new(filter));
        self
    }

    /// Register an instance hook for a reserved event
    ///
    /// # Errors
    ///
    /// Returns [`Error::Misuse`] for events that never reach instance hooks.
    pub fn on<F>(mut self, event: Event, hook: F) -> Result<Self>
    where
        F: Fn(&mut HookPayload<'_>) -> Result<()> + Send + Sync + 'static,
    {
        if !event.is_reserved() {
            return Err(Error::misuse(format!(
                "'{}' is not delivered to instance hooks",
                event
            )));
        }
        self.hooks.entry(event).or_default().push(Arc::new(hook));
        Ok(self)
    }
}

impl Filterable for ModelDef {
    fn filter(&self, field: &str, value: Value, past: Option<&Value>) -> std::result::Result<Value, Rejection> {
        match self.filters.get(field) {
            Some(filter) => filter(value, past),
            None => Ok(value),
        }
    }
}

impl Model for ModelDef {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    fn database(&self) -> Option<String> {
        self.database.clone()
    }

    fn on_event(&self, event: Event, payload: &mut HookPayload<'_>) -> Result<()> {
        if let Some(hooks) = self.hooks.get(&event) {
            for hook in hooks {
                hook(payload)?;
            }
        }
        Ok(())
    }
}

/// Models known to a mapper, by type name
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<dyn Model>>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under its type name, replacing any previous entry
    pub fn register(&self, model: Arc<dyn Model>) {
        let name = model.type_name().to_string();
        self.models.write().insert(name, model);
    }

    /// Look up a model by type name
    ///
    /// # Errors
    ///
    /// Returns [`Error::Misuse`] if no model of that name is registered.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Model>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::misuse(format!("unknown model type '{}'", name)))
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// Registered type names, unordered
    pub fn names(&self) -> Vec<String> {
        self.models.read().keys().cloned().collect()
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}
