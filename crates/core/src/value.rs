//! Document tree for docmap
//!
//! This module defines:
//! - Value: one node of a document tree
//! - Document: a keyed mapping from field name to Value
//!
//! ## Value Model
//!
//! A Value is a scalar (`Null`, `Bool`, `Int`, `Float`, `String`), an ordered
//! sequence (`Array`), a nested `Document`, or a relationship descriptor
//! (`Reference`). Dereferencing adds two resolved forms:
//!
//! - `Record`: a detached copy of the object a static reference names
//! - `ResultSet`: the ordered result of a dynamic reference, together with
//!   the descriptor that produced it
//!
//! ### Type Rules
//!
//! - `Int(1) != Float(1.0)`: different types are never equal
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - References compare by descriptor only; metadata keys are ignored
//!
//! ## Emptiness
//!
//! [`Value::is_empty`] decides which live fields are skipped by the diff
//! engine: `Null`, `false`, `0`, `0.0`, `""`, `[]` and `{}` are empty.
//! References and resolved values are never empty.

use crate::record::{Record, ResultSet};
use crate::reference::Reference;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One node of a document tree
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered sequence of values
    Array(Vec<Value>),
    /// Nested document
    Document(Document),
    /// Relationship descriptor
    Reference(Reference),
    /// Resolved static reference
    Record(Box<Record>),
    /// Resolved dynamic reference
    ResultSet(ResultSet),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::ResultSet(a), Value::ResultSet(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Document(_) => "Document",
            Value::Reference(_) => "Reference",
            Value::Record(_) => "Record",
            Value::ResultSet(_) => "ResultSet",
        }
    }

    /// True for values the diff engine never persists on their own
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Document(d) => d.is_empty(),
            Value::Reference(_) | Value::Record(_) | Value::ResultSet(_) => false,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is an array value
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Check if this is a nested document
    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Check if this is an unresolved reference
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Check if this is a resolved value (`Record` or `ResultSet`)
    pub fn is_resolved(&self) -> bool {
        matches!(self, Value::Record(_) | Value::ResultSet(_))
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[Value] if this is an Array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as &Document if this is a Document value
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Get as &mut Document if this is a Document value
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Get as &Reference if this is an unresolved reference
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Get as &Record if this is a resolved static reference
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get as &mut Record if this is a resolved static reference
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get as &ResultSet if this is a resolved dynamic reference
    pub fn as_result_set(&self) -> Option<&ResultSet> {
        match self {
            Value::ResultSet(r) => Some(r),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(Box::new(r))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// Keyed mapping from field name to [`Value`]
///
/// Keys iterate in sorted order so that every traversal (diffing, reference
/// scanning, serialization) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the document has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field mutably
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Check whether a field is present (even if empty)
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Builder form of [`Document::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Entry for in-place manipulation
    pub fn entry(&mut self, key: String) -> btree_map::Entry<'_, String, Value> {
        self.fields.entry(key)
    }

    /// Iterate fields in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterate fields mutably in key order
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, Value> {
        self.fields.iter_mut()
    }

    /// Iterate field names in key order
    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.fields.keys()
    }

    /// Keep only the fields for which `f` returns true
    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut Value) -> bool) {
        self.fields.retain(|k, v| f(k, v));
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl Extend<(String, Value)> for Document {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

/// Build a [`Document`] from `key => value` pairs
///
/// ```
/// use docmap_core::{doc, Value};
///
/// let d = doc! { "name" => "Alice", "age" => 30 };
/// assert_eq!(d.get("age"), Some(&Value::Int(30)));
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::Document::new();
        $( d.insert($key, $value); )+
        d
    }};
}
