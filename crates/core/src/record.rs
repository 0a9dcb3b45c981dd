//! Detached records
//!
//! A [`Record`] is the live field mapping of one persisted object together
//! with its snapshot, the document as last read from or written to the store.
//! Records are plain owned data: cloning one deep-copies both mappings, so
//! two records never share state.
//!
//! Records have no iteration API. Query-bound iteration lives on the
//! engine's cursor type, which hands out records through `detach`.

use crate::error::Result;
use crate::reference::Reference;
use crate::value::{Document, Value};
use std::fmt;

/// Default identity field name
pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

/// Database and collection pair addressing a set of documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Create a namespace
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Namespace {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Live field mapping plus snapshot of one object
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: Option<String>,
    namespace: Namespace,
    fields: Document,
    snapshot: Document,
    origin: Option<Reference>,
}

impl Record {
    /// New, never persisted record of `model`
    pub fn new(model: impl Into<String>, namespace: Namespace) -> Self {
        Record {
            model: Some(model.into()),
            namespace,
            fields: Document::new(),
            snapshot: Document::new(),
            origin: None,
        }
    }

    /// Record built from a stored document
    ///
    /// Keys starting with `$` are store metadata and are not copied onto the
    /// live fields; the snapshot keeps the document verbatim.
    pub fn loaded(model: Option<String>, namespace: Namespace, document: Document) -> Self {
        let fields = document
            .iter()
            .filter(|(k, _)| !k.starts_with('$'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Record {
            model,
            namespace,
            fields,
            snapshot: document,
            origin: None,
        }
    }

    /// Remember the descriptor this record was resolved from
    pub fn resolved_from(mut self, reference: Reference) -> Self {
        self.origin = Some(reference);
        self
    }

    /// Descriptor this record was resolved from, if any
    pub fn origin(&self) -> Option<&Reference> {
        self.origin.as_ref()
    }

    /// Model type name (None for untyped records resolved from legacy references)
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Namespace the record lives in
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Live fields
    pub fn fields(&self) -> &Document {
        &self.fields
    }

    /// Live fields, mutably
    pub fn fields_mut(&mut self) -> &mut Document {
        &mut self.fields
    }

    /// Last persisted state
    pub fn snapshot(&self) -> &Document {
        &self.snapshot
    }

    /// Replace the snapshot after a successful store round trip
    pub fn set_snapshot(&mut self, snapshot: Document) {
        self.snapshot = snapshot;
    }

    /// Get a live field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a live field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field, value);
        self
    }

    /// Remove a live field
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Identity value, if the record has one
    pub fn id(&self, identity_field: &str) -> Option<&Value> {
        self.fields.get(identity_field).filter(|v| !v.is_null())
    }

    /// True once the record has been inserted or loaded
    pub fn is_persisted(&self, identity_field: &str) -> bool {
        self.id(identity_field).is_some()
    }

    /// Static reference to this record
    ///
    /// Returns `None` when the record has no identity yet. A record resolved
    /// from a descriptor hands that descriptor back, without metadata, as long
    /// as its identity is unchanged. Other untyped records produce a legacy
    /// reference.
    pub fn reference(&self, identity_field: &str) -> Option<Reference> {
        let id = self.id(identity_field)?.clone();
        if let Some(origin) = self.origin.as_ref().filter(|o| o.id() == Some(&id)) {
            let mut reference = origin.clone();
            reference.strip_metadata();
            return Some(reference);
        }
        Some(match &self.model {
            Some(model) => Reference::new_static(model.clone(), &self.namespace, id),
            None => Reference::new_legacy(
                self.namespace.collection.clone(),
                id,
                Some(self.namespace.database.clone()),
            ),
        })
    }

    /// Build a fresh record from a typed value
    pub fn from_persist<T: Persist>(value: &T, namespace: Namespace) -> Self {
        let mut record = Record::new(T::model_name(), namespace);
        record.fields = value.to_fields();
        record
    }

    /// Read the live fields back into a typed value
    pub fn to_persist<T: Persist>(&self) -> Result<T> {
        T::from_fields(&self.fields)
    }
}

/// Ordered result of a resolved dynamic reference
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Detached records in query order
    pub records: Vec<Record>,
    /// Descriptor that produced the records
    pub reference: Reference,
}

impl ResultSet {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate the records
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

/// Explicit field mapping for typed structs
///
/// Persisted types declare how they turn into a [`Document`] and back; no
/// field is ever discovered by introspection.
pub trait Persist: Sized {
    /// Model type name recorded in references
    fn model_name() -> &'static str;

    /// Field mapping of this value
    fn to_fields(&self) -> Document;

    /// Rebuild a value from a field mapping
    fn from_fields(fields: &Document) -> Result<Self>;
}
