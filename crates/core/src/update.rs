//! Update instruction sets
//!
//! An [`UpdateSet`] is the field-level mutation the diff engine produces for
//! an already persisted object: dotted paths to overwrite and dotted paths
//! to remove. A path never appears in both halves; recording one side
//! removes the path from the other.
//!
//! Sets are built fresh for every persistence attempt and are never applied
//! partially. An empty set means there is nothing to persist.

use crate::error::Result;
use crate::path::{delete_at_path, set_at_path, DocPath};
use crate::value::{Document, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Field-level update: `$set` and `$unset` halves keyed by dotted path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSet {
    set: BTreeMap<String, Value>,
    unset: BTreeSet<String>,
}

impl UpdateSet {
    /// Empty update set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path = value`
    pub fn set(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        let path = path.into();
        self.unset.remove(&path);
        self.set.insert(path, value.into());
    }

    /// Record removal of `path`
    pub fn unset(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.set.remove(&path);
        self.unset.insert(path);
    }

    /// Paths to overwrite
    pub fn sets(&self) -> &BTreeMap<String, Value> {
        &self.set
    }

    /// Paths to remove
    pub fn unsets(&self) -> &BTreeSet<String> {
        &self.unset
    }

    /// Value recorded for `path`
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.set.get(path)
    }

    /// True if `path` is recorded for removal
    pub fn is_unset(&self, path: &str) -> bool {
        self.unset.contains(path)
    }

    /// True when there is nothing to persist
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Total number of instructions
    pub fn len(&self) -> usize {
        self.set.len() + self.unset.len()
    }

    /// Fold another set into this one
    pub fn merge(&mut self, other: UpdateSet) {
        for (path, value) in other.set {
            self.set(path, value);
        }
        for path in other.unset {
            self.unset(path);
        }
    }

    /// Apply the instructions to a document
    ///
    /// Used by in-memory stores and to advance a snapshot after a successful
    /// update. Unsetting a missing path is not an error.
    pub fn apply_to(&self, document: &mut Document) -> Result<()> {
        for (path, value) in &self.set {
            let path: DocPath = path.parse()?;
            set_at_path(document, &path, value.clone())?;
        }
        for path in &self.unset {
            let path: DocPath = path.parse()?;
            delete_at_path(document, &path)?;
        }
        Ok(())
    }

    /// Operator form: `{"$set": {...}, "$unset": {path: 1}}`
    ///
    /// Empty halves are omitted.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        if !self.set.is_empty() {
            let set = self
                .set
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            out.insert("$set".to_string(), serde_json::Value::Object(set));
        }
        if !self.unset.is_empty() {
            let unset = self
                .unset
                .iter()
                .map(|k| (k.clone(), serde_json::Value::from(1)))
                .collect();
            out.insert("$unset".to_string(), serde_json::Value::Object(unset));
        }
        serde_json::Value::Object(out)
    }
}
