//! Mapper: the entry point tying models, hooks and the store together
//!
//! ## Usage
//!
//! ```
//! use docmap_engine::{Mapper, MemoryStore, ModelDef, SaveOutcome};
//! use std::sync::Arc;
//!
//! let mapper = Mapper::new(Arc::new(MemoryStore::new()));
//! mapper.register(ModelDef::new("Author"));
//!
//! let mut author = mapper.create("Author").unwrap();
//! author.set("name", "Alice");
//! assert!(matches!(mapper.save(&mut author).unwrap(), SaveOutcome::Inserted(_)));
//!
//! author.set("name", "Alicia");
//! match mapper.save(&mut author).unwrap() {
//!     SaveOutcome::Updated(set) => assert_eq!(set.len(), 1),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```
//!
//! ## Persistence Flow
//!
//! `save` computes the change set, stops if it is empty, fires
//! `before_create`/`before_update`, writes, advances the record's snapshot to
//! what the store now holds, then fires `after_create`/`after_update`.
//! A record counts as new until it has a snapshot.

use crate::config::MapperConfig;
use crate::cursor::Cursor;
use crate::deref::{Dereferencer, ResolveStats};
use crate::diff::{Computed, DiffEngine, DiffOutcome};
use crate::hooks::{Event, HookContext, HookPayload, HookRegistry};
use crate::model::{namespace_for, Model, ModelRegistry};
use crate::scanner::{scan, Discovered};
use crate::store::DocumentStore;
use docmap_core::{
    Document, Error, Persist, Record, Reference, Result, StoredQuery, UpdateSet, Value,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// What `save` did
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// First insertion; carries the identity the store assigned or kept
    Inserted(Value),
    /// Update with the instructions that were sent
    Updated(UpdateSet),
    /// Nothing changed since the last snapshot
    Unchanged,
}

/// Object-document mapper over one store
pub struct Mapper {
    store: Arc<dyn DocumentStore>,
    models: ModelRegistry,
    hooks: HookRegistry,
    config: MapperConfig,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("models", &self.models)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}

impl Mapper {
    /// Mapper over `store` with the default configuration
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Mapper {
            store,
            models: ModelRegistry::new(),
            hooks: HookRegistry::new(),
            config: MapperConfig::default(),
        }
    }

    /// Mapper over `store` with `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: MapperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Mapper {
            config,
            ..Self::new(store)
        })
    }

    /// Register a model under its type name
    pub fn register(&self, model: impl Model + 'static) {
        self.models.register(Arc::new(model));
    }

    /// Registered models
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Hook subscriptions
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Active configuration
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn identity_field(&self) -> &str {
        &self.config.identity_field
    }

    fn fire(&self, model: &dyn Model, event: Event, payload: &mut HookPayload<'_>) -> Result<()> {
        self.hooks.fire(model.type_name(), event, payload, Some(model))
    }

    fn model_of(&self, record: &Record) -> Result<Arc<dyn Model>> {
        let name = record
            .model()
            .ok_or_else(|| Error::misuse("untyped records cannot be persisted"))?;
        self.models.get(name)
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// New, empty record of a registered model
    ///
    /// # Errors
    ///
    /// Returns [`Error::Misuse`] if the model is not registered.
    pub fn create(&self, model: &str) -> Result<Record> {
        let def = self.models.get(model)?;
        let namespace = namespace_for(def.as_ref(), &self.config.default_database);
        Ok(Record::new(def.type_name(), namespace))
    }

    /// New record holding the fields of a typed value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Misuse`] if `T`'s model is not registered.
    pub fn create_from<T: Persist>(&self, value: &T) -> Result<Record> {
        let def = self.models.get(T::model_name())?;
        let namespace = namespace_for(def.as_ref(), &self.config.default_database);
        Ok(Record::from_persist(value, namespace))
    }

    /// Static reference to a saved record; `None` before its first save
    pub fn reference(&self, record: &Record) -> Option<Reference> {
        record.reference(self.identity_field())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Compute what saving `record` would send, without writing
    ///
    /// Filter rewrites are copied back onto the record's live fields.
    pub fn compute_update(&self, record: &mut Record) -> Result<DiffOutcome> {
        let model = self.model_of(record)?;
        let is_update = !record.snapshot().is_empty();
        let outcome = DiffEngine::new(model.as_ref())
            .identity_field(self.identity_field())
            .with_hooks(HookContext::new(&self.hooks, model.type_name(), Some(model.as_ref())))
            .compute(record.fields(), record.snapshot(), is_update)?;

        for (field, value) in outcome.rewritten.iter() {
            record.fields_mut().insert(field.as_str(), value.clone());
        }
        Ok(outcome)
    }

    /// Persist `record`
    ///
    /// A record without a snapshot is inserted, even when its identity field
    /// was set by hand; the store keeps that identity. Records that were
    /// loaded or saved before are updated.
    ///
    /// # Errors
    ///
    /// Propagates diff, hook and store errors. On error the snapshot is left
    /// unchanged.
    pub fn save(&self, record: &mut Record) -> Result<SaveOutcome> {
        let model = self.model_of(record)?;
        let outcome = self.compute_update(record)?;
        if outcome.is_empty() {
            debug!(target: "docmap::mapper", model = model.type_name(), "Save skipped, nothing changed");
            return Ok(SaveOutcome::Unchanged);
        }

        let namespace = record.namespace().clone();
        let name = model.type_name();

        match outcome.computed {
            Computed::Insert(mut document) => {
                self.fire(model.as_ref(), Event::before_save_for(false), &mut HookPayload::Insert(&mut document))?;
                let id = self.store.insert(&namespace, document.clone())?;
                document.insert(self.identity_field(), id.clone());
                record.fields_mut().insert(self.identity_field(), id.clone());
                record.set_snapshot(document.clone());
                self.fire(model.as_ref(), Event::after_save_for(false), &mut HookPayload::Insert(&mut document))?;
                info!(target: "docmap::mapper", model = name, namespace = %namespace, id = ?id, "Inserted record");
                Ok(SaveOutcome::Inserted(id))
            }
            Computed::Update(mut update) => {
                self.fire(model.as_ref(), Event::before_save_for(true), &mut HookPayload::Update(&mut update))?;
                let id = record.id(self.identity_field()).cloned().ok_or_else(|| {
                    Error::misuse(format!(
                        "record of '{}' has a snapshot but no '{}'",
                        name,
                        self.identity_field()
                    ))
                })?;
                self.store.update(&namespace, &id, &update)?;
                let mut snapshot = record.snapshot().clone();
                update.apply_to(&mut snapshot)?;
                record.set_snapshot(snapshot);
                self.fire(model.as_ref(), Event::after_save_for(true), &mut HookPayload::Update(&mut update))?;
                info!(
                    target: "docmap::mapper",
                    model = name,
                    id = ?id,
                    sets = update.sets().len(),
                    unsets = update.unsets().len(),
                    "Updated record"
                );
                Ok(SaveOutcome::Updated(update))
            }
        }
    }

    /// Remove `record` from the store
    ///
    /// Returns `false` for records that were never saved. After a delete the
    /// snapshot is cleared, so saving again inserts.
    pub fn delete(&self, record: &mut Record) -> Result<bool> {
        let model = self.model_of(record)?;
        let Some(id) = record.id(self.identity_field()).cloned() else {
            return Ok(false);
        };
        let selector = Document::new().with(self.identity_field(), id);
        let name = model.type_name();

        self.fire(model.as_ref(), Event::BeforeDelete, &mut HookPayload::Selector(&selector))?;
        let removed = self.store.remove(record.namespace(), &selector)?;
        self.fire(model.as_ref(), Event::AfterDelete, &mut HookPayload::Selector(&selector))?;

        record.set_snapshot(Document::new());
        info!(target: "docmap::mapper", model = name, removed, "Deleted record");
        Ok(removed > 0)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Documents of `model` matching `selector`
    pub fn find(&self, model: &str, selector: Document) -> Result<Cursor> {
        self.query(model, StoredQuery::new(selector))
    }

    /// Documents of `model` matching `query`, honoring its projection,
    /// limit and skip
    pub fn query(&self, model: &str, query: StoredQuery) -> Result<Cursor> {
        let def = self.models.get(model)?;
        let namespace = namespace_for(def.as_ref(), &self.config.default_database);
        let documents = self.store.find_by_query(&namespace, &query)?;
        debug!(target: "docmap::mapper", model, results = documents.len(), "Query returned");
        Ok(Cursor::new(
            def.type_name(),
            namespace,
            query,
            documents,
            self.store.capabilities().query_replay,
        ))
    }

    /// Documents of `model` whose identity is in `ids`
    pub fn find_by_ids(&self, model: &str, ids: &[Value]) -> Result<Cursor> {
        let def = self.models.get(model)?;
        let namespace = namespace_for(def.as_ref(), &self.config.default_database);
        let documents = self.store.find_by_ids(&namespace, ids)?;
        let selector = Document::new().with(
            self.identity_field(),
            Document::new().with("$in", ids.to_vec()),
        );
        Ok(Cursor::new(
            def.type_name(),
            namespace,
            StoredQuery::new(selector),
            documents,
            self.store.capabilities().query_replay,
        ))
    }

    /// Documents of the record's model that share its non-empty fields
    ///
    /// Fields holding records or references match on the target identity
    /// through a `field.$id` selector.
    pub fn find_like(&self, record: &Record) -> Result<Cursor> {
        let model = self.model_of(record)?;
        let mut selector = Document::new();
        for (field, value) in record.fields() {
            if value.is_empty() {
                continue;
            }
            match value {
                Value::Record(target) => {
                    let id = target.id(self.identity_field()).cloned().ok_or_else(|| {
                        Error::misuse(format!("field '{}' holds a record that has not been saved", field))
                    })?;
                    selector.insert(format!("{}.$id", field), id);
                }
                Value::Reference(reference) => {
                    if let Some(id) = reference.id() {
                        selector.insert(format!("{}.$id", field), id.clone());
                    }
                }
                Value::ResultSet(_) => {}
                other => {
                    selector.insert(field.as_str(), other.clone());
                }
            }
        }
        self.find(model.type_name(), selector)
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Resolve every reference in the record's live fields
    pub fn resolve(&self, record: &mut Record) -> Result<ResolveStats> {
        let discovered = scan(record.fields());
        self.resolve_refs(record, discovered)
    }

    /// Resolve a chosen subset of references
    ///
    /// Resolution runs on a working copy; top-level fields that changed are
    /// copied onto the record once every lookup succeeded. The snapshot is
    /// not touched.
    pub fn resolve_refs(&self, record: &mut Record, discovered: Vec<Discovered>) -> Result<ResolveStats> {
        if discovered.is_empty() {
            return Ok(ResolveStats::default());
        }
        let mut working = record.fields().clone();
        let stats = Dereferencer::new(self.store.as_ref(), &self.models, &self.config)
            .resolve(&mut working, discovered)?;

        for (field, value) in working {
            if record.get(&field) != Some(&value) {
                record.fields_mut().insert(field, value);
            }
        }
        Ok(stats)
    }
}
