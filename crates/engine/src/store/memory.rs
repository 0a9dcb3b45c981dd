//! In-memory document store
//!
//! Collections are vectors of documents in insertion order, keyed by
//! namespace in a `BTreeMap` behind a `parking_lot::RwLock`. Every call made
//! through [`DocumentStore`] is appended to a call log so callers can check
//! how many round trips an operation took.
//!
//! # Selectors
//!
//! A selector is a document of `path => expected` pairs, all of which must
//! hold:
//!
//! - paths are dotted and may cross documents, arrays (numeric segments) and
//!   references (`author.$id`, `author.$ref`, `author.$db`)
//! - `{"$in": [..]}` matches any listed value
//! - a scalar matches an array that contains it
//! - `null` matches a missing path

use super::{Capabilities, DocumentStore};
use docmap_core::{
    get_at_path, set_at_path, DocPath, Document, Error, Namespace, Reference, Result,
    StoredQuery, UpdateSet, Value, DEFAULT_IDENTITY_FIELD,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// A call received by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// `insert`
    Insert {
        /// Target namespace
        namespace: Namespace,
    },
    /// `update`
    Update {
        /// Target namespace
        namespace: Namespace,
        /// Identity of the updated document
        id: Value,
    },
    /// `find_by_ids`
    FindByIds {
        /// Target namespace
        namespace: Namespace,
        /// Requested identities
        ids: Vec<Value>,
    },
    /// `find_by_query`
    FindByQuery {
        /// Target namespace
        namespace: Namespace,
        /// Query as received
        query: StoredQuery,
    },
    /// `remove`
    Remove {
        /// Target namespace
        namespace: Namespace,
        /// Selector as received
        selector: Document,
    },
}

/// Process-local [`DocumentStore`]
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<Namespace, Vec<Document>>>,
    calls: Mutex<Vec<StoreCall>>,
    identity_field: String,
    capabilities: Capabilities,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store using `_id` as identity field
    pub fn new() -> Self {
        MemoryStore {
            collections: RwLock::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            capabilities: Capabilities::default(),
        }
    }

    /// Use a different identity field
    pub fn with_identity_field(mut self, identity_field: impl Into<String>) -> Self {
        self.identity_field = identity_field.into();
        self
    }

    /// Report no query replay support, as older connectors do
    pub fn without_query_replay(mut self) -> Self {
        self.capabilities.query_replay = false;
        self
    }

    /// Load documents directly, bypassing the call log
    ///
    /// Documents without an identity get a fresh one.
    pub fn seed(&self, namespace: &Namespace, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.write();
        let collection = collections.entry(namespace.clone()).or_default();
        for mut document in documents {
            if document.get(&self.identity_field).map_or(true, Value::is_null) {
                document.insert(self.identity_field.as_str(), new_id());
            }
            collection.push(document);
        }
    }

    /// Current documents of a namespace, in insertion order
    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.collections
            .read()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// `find_by_ids` calls received so far, as (namespace, id count)
    pub fn batch_sizes(&self) -> Vec<(Namespace, usize)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::FindByIds { namespace, ids } => Some((namespace.clone(), ids.len())),
                _ => None,
            })
            .collect()
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }

    fn has_id(&self, document: &Document, id: &Value) -> bool {
        document.get(&self.identity_field) == Some(id)
    }
}

fn new_id() -> Value {
    Value::from(Uuid::new_v4().to_string())
}

impl DocumentStore for MemoryStore {
    fn insert(&self, namespace: &Namespace, mut document: Document) -> Result<Value> {
        self.record(StoreCall::Insert {
            namespace: namespace.clone(),
        });

        let id = match document.get(&self.identity_field) {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = new_id();
                document.insert(self.identity_field.as_str(), id.clone());
                id
            }
        };

        let mut collections = self.collections.write();
        let collection = collections.entry(namespace.clone()).or_default();
        if collection.iter().any(|d| self.has_id(d, &id)) {
            return Err(Error::Store(format!(
                "duplicate {} {:?} in {}",
                self.identity_field, id, namespace
            )));
        }
        collection.push(document);
        debug!(target: "docmap::store", namespace = %namespace, "Inserted document");
        Ok(id)
    }

    fn update(&self, namespace: &Namespace, id: &Value, update: &UpdateSet) -> Result<()> {
        self.record(StoreCall::Update {
            namespace: namespace.clone(),
            id: id.clone(),
        });

        let mut collections = self.collections.write();
        let target = collections
            .get_mut(namespace)
            .and_then(|c| c.iter_mut().find(|d| self.has_id(d, id)));
        match target {
            Some(document) => update.apply_to(document),
            None => {
                warn!(target: "docmap::store", namespace = %namespace, id = ?id, "Update matched no document");
                Ok(())
            }
        }
    }

    fn find_by_ids(&self, namespace: &Namespace, ids: &[Value]) -> Result<Vec<Document>> {
        self.record(StoreCall::FindByIds {
            namespace: namespace.clone(),
            ids: ids.to_vec(),
        });

        let collections = self.collections.read();
        Ok(collections
            .get(namespace)
            .map(|c| {
                c.iter()
                    .filter(|d| ids.iter().any(|id| self.has_id(d, id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_by_query(&self, namespace: &Namespace, query: &StoredQuery) -> Result<Vec<Document>> {
        self.record(StoreCall::FindByQuery {
            namespace: namespace.clone(),
            query: query.clone(),
        });

        let collections = self.collections.read();
        let Some(collection) = collections.get(namespace) else {
            return Ok(Vec::new());
        };
        let limit = match query.limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);

        collection
            .iter()
            .filter(|d| matches_selector(d, &query.filter))
            .skip(skip)
            .take(limit)
            .map(|d| project(d, &query.fields, &self.identity_field))
            .collect()
    }

    fn remove(&self, namespace: &Namespace, selector: &Document) -> Result<u64> {
        self.record(StoreCall::Remove {
            namespace: namespace.clone(),
            selector: selector.clone(),
        });

        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(namespace) else {
            return Ok(0);
        };
        let before = collection.len();
        collection.retain(|d| !matches_selector(d, selector));
        Ok((before - collection.len()) as u64)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// True when `document` satisfies every condition of `selector`
pub(crate) fn matches_selector(document: &Document, selector: &Document) -> bool {
    selector.iter().all(|(path, expected)| {
        let actual = lookup(document, path);
        if let Some(options) = expected
            .as_document()
            .and_then(|op| op.get("$in"))
        {
            let Some(options) = options.as_array() else {
                return false;
            };
            return actual.map_or(false, |a| options.iter().any(|o| value_matches(&a, o)));
        }
        match actual {
            Some(actual) => value_matches(&actual, expected),
            None => expected.is_null(),
        }
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    actual == expected || matches!(actual, Value::Array(items) if items.contains(expected))
}

fn lookup(document: &Document, path: &str) -> Option<Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    while let Some(part) = parts.next() {
        current = match current {
            Value::Document(d) => d.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            Value::Reference(r) => {
                return if parts.next().is_none() {
                    reference_key(r, part)
                } else {
                    None
                };
            }
            _ => return None,
        };
    }
    Some(current.clone())
}

fn reference_key(reference: &Reference, key: &str) -> Option<Value> {
    match key {
        "$id" => reference.id().cloned(),
        "$ref" => Some(Value::from(reference.collection())),
        "$db" => reference.database().map(Value::from),
        _ => None,
    }
}

fn project(document: &Document, fields: &[String], identity_field: &str) -> Result<Document> {
    if fields.is_empty() {
        return Ok(document.clone());
    }
    let mut out = Document::new();
    if let Some(id) = document.get(identity_field) {
        out.insert(identity_field, id.clone());
    }
    for field in fields {
        let path: DocPath = field.parse()?;
        if let Some(value) = get_at_path(document, &path) {
            set_at_path(&mut out, &path, value.clone())?;
        }
    }
    Ok(out)
}
