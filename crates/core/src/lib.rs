//! Core types for docmap
//!
//! This crate defines the foundational types shared by the diff engine and
//! the dereference scheduler:
//! - Value / Document: the recursive document tree
//! - Reference / StoredQuery: static, dynamic and legacy relationship descriptors
//! - Record / ResultSet: detached objects produced by loading and dereferencing
//! - DocPath: tree addressing (get/set/delete at path)
//! - UpdateSet: `$set` / `$unset` instruction sets
//! - Error: error taxonomy
//! - Wire form: conversion to and from `serde_json`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod path;
pub mod record;
pub mod reference;
pub mod update;
pub mod value;
pub mod wire;

pub use error::{Error, Result};
pub use path::{delete_at_path, get_at_path, get_at_path_mut, set_at_path, DocPath, PathError, PathSegment};
pub use record::{Namespace, Persist, Record, ResultSet, DEFAULT_IDENTITY_FIELD};
pub use reference::{Reference, ReferenceKind, StoredQuery};
pub use update::UpdateSet;
pub use value::{Document, Value};
