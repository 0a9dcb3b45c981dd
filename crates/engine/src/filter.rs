//! Per-field filters run during diff construction
//!
//! A model implements [`Filterable::filter`] to validate or rewrite a field
//! value before it enters an insert document or update set. The default
//! implementation passes everything through, so models without filters
//! need no code.

use docmap_core::{Document, Error, Result, Value};
use std::fmt;

/// Reason a filter refused a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Human readable reason
    pub reason: String,
}

impl Rejection {
    /// Rejection with `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Rejection {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Field validation and rewrite capability
pub trait Filterable {
    /// Filter `value` for the top-level `field`
    ///
    /// `past` is the snapshot value on updates and `None` on first insertion.
    /// Return the value to persist, possibly rewritten, or a [`Rejection`].
    fn filter(&self, field: &str, value: Value, past: Option<&Value>) -> std::result::Result<Value, Rejection> {
        let _ = (field, past);
        Ok(value)
    }
}

/// Filterable with no filters
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilters;

impl Filterable for NoFilters {}

/// Runs a model's filters and tracks which fields they rewrote
pub struct FilterPipeline<'a, F: Filterable + ?Sized> {
    filters: &'a F,
    rewritten: Document,
}

impl<'a, F: Filterable + ?Sized> FilterPipeline<'a, F> {
    /// Pipeline over `filters`
    pub fn new(filters: &'a F) -> Self {
        FilterPipeline {
            filters,
            rewritten: Document::new(),
        }
    }

    /// Run the filter for `field` in place
    ///
    /// Returns `true` when the filter changed the value. A rejection becomes
    /// [`Error::Validation`] and aborts the computation.
    pub fn run(&mut self, field: &str, value: &mut Value, past: Option<&Value>) -> Result<bool> {
        let input = std::mem::replace(value, Value::Null);
        let original = input.clone();
        let output = self
            .filters
            .filter(field, input, past)
            .map_err(|r| Error::validation(field, r.reason))?;
        let changed = output != original;
        if changed {
            self.rewritten.insert(field, output.clone());
        }
        *value = output;
        Ok(changed)
    }

    /// Fields whose values the filters rewrote, with their new values
    pub fn rewritten(&self) -> &Document {
        &self.rewritten
    }

    /// Consume the pipeline, returning the rewritten fields
    pub fn into_rewritten(self) -> Document {
        self.rewritten
    }
}
