//! Relationship descriptors
//!
//! A [`Reference`] names another document. Three kinds exist:
//!
//! | Kind | Carries | Resolves to |
//! |------|---------|-------------|
//! | Static | collection, id, database, target type | one [`Record`](crate::Record) |
//! | Dynamic | target type, stored query | a [`ResultSet`](crate::ResultSet) |
//! | Legacy | collection, id, optional database | one untyped record |
//!
//! Legacy references lack a target type marker; they come from foreign
//! writers and are resolved one by one.
//!
//! # Wire Shape
//!
//! ```text
//! { "$ref": "authors", "$id": "...", "$db": "blog", "class": "Author",
//!   "dynamic": { "filter": {...}, "fields": [...], "limit": 5, "skip": 2 } }
//! ```
//!
//! Any other key found on a descriptor is kept as metadata and never written
//! back as part of the reference.

use crate::record::Namespace;
use crate::value::{Document, Value};

/// Collection name key
pub const REF_KEY: &str = "$ref";
/// Identity value key
pub const ID_KEY: &str = "$id";
/// Database name key
pub const DB_KEY: &str = "$db";
/// Target type key
pub const CLASS_KEY: &str = "class";
/// Stored query key (dynamic references only)
pub const DYNAMIC_KEY: &str = "dynamic";

/// Keys that make up a descriptor; everything else is metadata
pub const DESCRIPTOR_KEYS: [&str; 5] = [REF_KEY, ID_KEY, DB_KEY, CLASS_KEY, DYNAMIC_KEY];

/// Reference classification used by the dereference scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Foreign descriptor without a target type
    Legacy,
    /// Query-backed descriptor
    Dynamic,
    /// Descriptor naming exactly one document
    Static,
}

/// A query saved inside a dynamic reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredQuery {
    /// Selector document
    pub filter: Document,
    /// Projected field names (empty = all fields)
    pub fields: Vec<String>,
    /// Maximum number of results (0 = unlimited)
    pub limit: u64,
    /// Number of leading results to drop (0 = none)
    pub skip: u64,
}

impl StoredQuery {
    /// Query matching `filter` with no projection, limit or skip
    pub fn new(filter: Document) -> Self {
        StoredQuery {
            filter,
            ..Default::default()
        }
    }

    /// Set the projected fields
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the limit
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the skip
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }
}

/// Relationship descriptor
#[derive(Debug, Clone)]
pub struct Reference {
    collection: String,
    id: Option<Box<Value>>,
    database: Option<String>,
    target_type: Option<String>,
    query: Option<StoredQuery>,
    metadata: Document,
}

// Metadata is display-only and does not take part in identity.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
            && self.id == other.id
            && self.database == other.database
            && self.target_type == other.target_type
            && self.query == other.query
    }
}

impl Reference {
    /// Static reference to the document `id` of `target_type`
    pub fn new_static(target_type: impl Into<String>, namespace: &Namespace, id: Value) -> Self {
        Reference {
            collection: namespace.collection.clone(),
            id: Some(Box::new(id)),
            database: Some(namespace.database.clone()),
            target_type: Some(target_type.into()),
            query: None,
            metadata: Document::new(),
        }
    }

    /// Dynamic reference replaying `query` against `target_type`
    pub fn new_dynamic(
        target_type: impl Into<String>,
        namespace: &Namespace,
        query: StoredQuery,
    ) -> Self {
        Reference {
            collection: namespace.collection.clone(),
            id: None,
            database: Some(namespace.database.clone()),
            target_type: Some(target_type.into()),
            query: Some(query),
            metadata: Document::new(),
        }
    }

    /// Foreign reference without a target type
    pub fn new_legacy(collection: impl Into<String>, id: Value, database: Option<String>) -> Self {
        Reference {
            collection: collection.into(),
            id: Some(Box::new(id)),
            database,
            target_type: None,
            query: None,
            metadata: Document::new(),
        }
    }

    /// Classify this reference
    pub fn kind(&self) -> ReferenceKind {
        match (&self.target_type, &self.query) {
            (None, _) => ReferenceKind::Legacy,
            (Some(_), Some(_)) => ReferenceKind::Dynamic,
            (Some(_), None) => ReferenceKind::Static,
        }
    }

    /// Target collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Target identity value (absent on most dynamic references)
    pub fn id(&self) -> Option<&Value> {
        self.id.as_deref()
    }

    /// Target database name, if recorded
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Target model type name
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    /// Stored query of a dynamic reference
    pub fn query(&self) -> Option<&StoredQuery> {
        self.query.as_ref()
    }

    /// Extra keys carried next to the descriptor
    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    /// Attach a metadata key
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Drop all metadata, keeping only the descriptor
    pub fn strip_metadata(&mut self) {
        self.metadata = Document::new();
    }

    /// Namespace of the target, falling back to `default_database`
    pub fn namespace(&self, default_database: &str) -> Namespace {
        Namespace::new(
            self.database.as_deref().unwrap_or(default_database),
            self.collection.as_str(),
        )
    }

    pub(crate) fn from_parts(
        collection: String,
        id: Option<Value>,
        database: Option<String>,
        target_type: Option<String>,
        query: Option<StoredQuery>,
        metadata: Document,
    ) -> Self {
        Reference {
            collection,
            id: id.map(Box::new),
            database,
            target_type,
            query,
            metadata,
        }
    }
}
