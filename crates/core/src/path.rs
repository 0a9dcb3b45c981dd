//! Tree paths
//!
//! This module defines:
//! - DocPath: a location inside a [`Document`] (e.g. `author` or `tags.2.ref`)
//! - PathSegment: one path component (Key or Index)
//! - get/set/delete operations addressing a tree by path
//!
//! # Dotted Form
//!
//! Paths render and parse as dot-separated segments, the form update sets
//! use for nested fields: `profile.address.city`. A numeric key applied to
//! an array addresses the element at that index.
//!
//! Splicing resolved references uses [`set_at_path`] over one owned tree
//! instead of holding aliased references into nested containers.

use crate::value::{Document, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for path parsing and tree addressing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Empty segment in a dotted path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),

    /// Type mismatch during traversal
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected container type
        expected: &'static str,
        /// Actual type found
        found: &'static str,
    },

    /// Array index out of bounds
    #[error("index out of bounds: {index} > {len}")]
    IndexOutOfBounds {
        /// The requested index
        index: usize,
        /// The array length
        len: usize,
    },

    /// Attempt to replace the document root through a path
    #[error("cannot write the document root through a path")]
    RootWrite,
}

/// A segment in a tree path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Document key
    Key(String),
    /// Array index
    Index(usize),
}

impl PathSegment {
    fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(k) => k.parse().ok(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A path into a document tree
///
/// # Examples
///
/// ```
/// use docmap_core::path::DocPath;
///
/// let city = DocPath::root().key("profile").key("city");
/// assert_eq!(city.to_string(), "profile.city");
///
/// let parsed: DocPath = "profile.city".parse().unwrap();
/// assert_eq!(parsed, city);
///
/// let tag = DocPath::root().key("tags").index(2);
/// assert_eq!(tag.to_string(), "tags.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DocPath {
    segments: Vec<PathSegment>,
}

impl DocPath {
    /// Create the root path (empty path)
    pub fn root() -> Self {
        DocPath {
            segments: Vec::new(),
        }
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        DocPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Get the number of segments in the path
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is the root path (empty)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Child path under `key`, leaving `self` untouched
    pub fn child(&self, key: impl Into<String>) -> Self {
        self.clone().key(key)
    }

    /// Push a key segment (mutating)
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    /// Push an index segment (mutating)
    pub fn push_index(&mut self, idx: usize) {
        self.segments.push(PathSegment::Index(idx));
    }

    /// Remove the last segment
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// First segment, the top-level field name for key paths
    pub fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Get the last segment (None if root)
    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Render in dotted form
    pub fn to_dotted(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for DocPath {
    type Err = PathError;

    /// Parse a dotted path; every segment becomes a key
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(DocPath::root());
        }

        let mut segments = Vec::new();
        let mut position = 0;
        for part in s.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptyKey(position));
            }
            segments.push(PathSegment::Key(part.to_string()));
            position += part.len() + 1;
        }
        Ok(DocPath { segments })
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dotted())
    }
}

// =============================================================================
// Path Operations
// =============================================================================

fn child<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (segment, value) {
        (PathSegment::Key(key), Value::Document(doc)) => doc.get(key),
        (seg, Value::Array(arr)) => arr.get(seg.as_index()?),
        _ => None,
    }
}

/// Get value at path within a document
///
/// Returns `None` if the path does not exist, crosses a scalar, or is the
/// root (the root is a [`Document`], not a [`Value`]).
///
/// ```
/// use docmap_core::{doc, Value};
/// use docmap_core::path::{get_at_path, DocPath};
///
/// let d = doc! { "user" => doc! { "tags" => vec!["a", "b"] } };
/// let path: DocPath = "user.tags.1".parse().unwrap();
/// assert_eq!(get_at_path(&d, &path), Some(&Value::from("b")));
/// ```
pub fn get_at_path<'a>(root: &'a Document, path: &DocPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    let mut current = root.get(key)?;
    for segment in rest {
        current = child(current, segment)?;
    }
    Some(current)
}

/// Get mutable reference to value at path within a document
pub fn get_at_path_mut<'a>(root: &'a mut Document, path: &DocPath) -> Option<&'a mut Value> {
    let (first, rest) = path.segments().split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    let mut current = root.get_mut(key)?;
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Document(doc)) => doc.get_mut(key)?,
            (seg, Value::Array(arr)) => arr.get_mut(seg.as_index()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn empty_container_for(next: &PathSegment) -> Value {
    match next {
        PathSegment::Key(_) => Value::Document(Document::new()),
        PathSegment::Index(_) => Value::Array(Vec::new()),
    }
}

/// Set value at path within a document
///
/// Creates intermediate containers as needed; the container type is chosen
/// from the next segment (index → array, key → document). Writing the root
/// path is rejected.
pub fn set_at_path(root: &mut Document, path: &DocPath, value: Value) -> Result<(), PathError> {
    let (first, rest) = path.segments().split_first().ok_or(PathError::RootWrite)?;
    let PathSegment::Key(key) = first else {
        return Err(PathError::TypeMismatch {
            expected: "Array",
            found: "Document",
        });
    };

    let Some(next) = rest.first() else {
        root.insert(key.clone(), value);
        return Ok(());
    };

    let slot = root
        .entry(key.clone())
        .or_insert_with(|| empty_container_for(next));
    set_in_value(slot, rest, value)
}

fn set_in_value(current: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), PathError> {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    let found = current.type_name();
    match current {
        Value::Document(doc) => {
            let PathSegment::Key(key) = segment else {
                return Err(PathError::TypeMismatch {
                    expected: "Array",
                    found,
                });
            };
            match rest.first() {
                None => {
                    doc.insert(key.clone(), value);
                    Ok(())
                }
                Some(next) => {
                    let slot = doc
                        .entry(key.clone())
                        .or_insert_with(|| empty_container_for(next));
                    set_in_value(slot, rest, value)
                }
            }
        }
        Value::Array(arr) => {
            let index = segment.as_index().ok_or(PathError::TypeMismatch {
                expected: "Document",
                found,
            })?;
            let len = arr.len();
            if rest.is_empty() {
                if index < len {
                    arr[index] = value;
                    Ok(())
                } else if index == len {
                    arr.push(value);
                    Ok(())
                } else {
                    Err(PathError::IndexOutOfBounds { index, len })
                }
            } else {
                let slot = arr
                    .get_mut(index)
                    .ok_or(PathError::IndexOutOfBounds { index, len })?;
                set_in_value(slot, rest, value)
            }
        }
        _ => Err(PathError::TypeMismatch {
            expected: "Document",
            found,
        }),
    }
}

/// Delete value at path within a document
///
/// Removes the key from its parent document, or removes the element from its
/// parent array (shifting later elements).
///
/// * `Ok(Some(value))` - The deleted value
/// * `Ok(None)` - The path didn't exist
/// * `Err(PathError)` - Root path, or a scalar in the middle of the path
pub fn delete_at_path(root: &mut Document, path: &DocPath) -> Result<Option<Value>, PathError> {
    let Some(parent_path) = path.segments().split_last().map(|(_, p)| p) else {
        return Err(PathError::RootWrite);
    };
    let last = path.last_segment().ok_or(PathError::RootWrite)?;

    if parent_path.is_empty() {
        return match last {
            PathSegment::Key(key) => Ok(root.remove(key)),
            PathSegment::Index(_) => Err(PathError::TypeMismatch {
                expected: "Array",
                found: "Document",
            }),
        };
    }

    let parent = DocPath::from_segments(parent_path.to_vec());
    let Some(container) = get_at_path_mut(root, &parent) else {
        return Ok(None);
    };
    match (last, container) {
        (PathSegment::Key(key), Value::Document(doc)) => Ok(doc.remove(key)),
        (seg, Value::Array(arr)) => match seg.as_index() {
            Some(i) if i < arr.len() => Ok(Some(arr.remove(i))),
            _ => Ok(None),
        },
        (_, other) => Err(PathError::TypeMismatch {
            expected: "Document",
            found: other.type_name(),
        }),
    }
}
