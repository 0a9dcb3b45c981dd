//! Change computation between live fields and their snapshot
//!
//! [`DiffEngine::compute`] turns a live field mapping into what the store
//! needs to persist it:
//!
//! - on first insertion, a flat document of every non-empty field
//! - on update, an [`UpdateSet`] of dotted-path `$set`/`$unset` instructions
//!
//! ## Update rules
//!
//! For each top-level live field:
//!
//! | live            | snapshot                | result                              |
//! |-----------------|-------------------------|-------------------------------------|
//! | empty           | any                     | skipped                             |
//! | document        | document                | recurse under `field.`              |
//! | document        | absent / scalar         | filter, `$set` whole value          |
//! | array/document  | document/array          | structural conflict                 |
//! | other           | different or absent     | filter with past, `$set`            |
//! | other           | equal                   | nothing                             |
//!
//! Inside sub-documents the same rules apply without the emptiness skip, and
//! keys that disappeared are unset by full dotted path. Top-level snapshot
//! fields missing from the live mapping are unset, except the identity field
//! and `$`-prefixed store metadata.
//!
//! Before any comparison, resolved records and result sets in the working
//! copy are reduced to their reference descriptors, so loading references
//! never shows up as a change.

use crate::filter::{FilterPipeline, Filterable};
use crate::hooks::{Event, HookContext, HookPayload};
use docmap_core::{
    DocPath, Document, Error, Result, UpdateSet, Value, DEFAULT_IDENTITY_FIELD,
};
use tracing::debug;

/// What a computation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    /// Full document for a first insertion
    Insert(Document),
    /// Instructions for an update
    Update(UpdateSet),
}

impl Computed {
    /// True when there is nothing to persist
    pub fn is_empty(&self) -> bool {
        match self {
            Computed::Insert(d) => d.is_empty(),
            Computed::Update(u) => u.is_empty(),
        }
    }

    /// Number of fields or instructions
    pub fn len(&self) -> usize {
        match self {
            Computed::Insert(d) => d.len(),
            Computed::Update(u) => u.len(),
        }
    }

    /// Insert document, if this is an insertion
    pub fn as_insert(&self) -> Option<&Document> {
        match self {
            Computed::Insert(d) => Some(d),
            Computed::Update(_) => None,
        }
    }

    /// Update set, if this is an update
    pub fn as_update(&self) -> Option<&UpdateSet> {
        match self {
            Computed::Update(u) => Some(u),
            Computed::Insert(_) => None,
        }
    }
}

/// Result of a computation
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    /// Insert document or update set
    pub computed: Computed,
    /// Top-level fields rewritten by filters, to copy back onto the live object
    pub rewritten: Document,
}

impl DiffOutcome {
    /// True when there is nothing to persist
    pub fn is_empty(&self) -> bool {
        self.computed.is_empty()
    }
}

/// Comparison of one field against its snapshot value
enum Change<'s> {
    Unchanged,
    Conflict,
    Recurse(&'s Document),
    Replace,
}

fn classify<'s>(value: &Value, past: Option<&'s Value>) -> Change<'s> {
    match (value, past) {
        (Value::Document(_), Some(Value::Document(old))) => Change::Recurse(old),
        (Value::Document(_), Some(Value::Array(_))) | (Value::Array(_), Some(Value::Document(_))) => {
            Change::Conflict
        }
        (_, Some(old)) if value == old => Change::Unchanged,
        _ => Change::Replace,
    }
}

/// Diff engine bound to one model's filters and hooks
pub struct DiffEngine<'a, F: Filterable + ?Sized> {
    identity_field: &'a str,
    filters: &'a F,
    hooks: Option<HookContext<'a>>,
}

impl<'a, F: Filterable + ?Sized> DiffEngine<'a, F> {
    /// Engine running `filters`, with no hooks and the default identity field
    pub fn new(filters: &'a F) -> Self {
        DiffEngine {
            identity_field: DEFAULT_IDENTITY_FIELD,
            filters,
            hooks: None,
        }
    }

    /// Use `identity_field` as the never-unset identity field
    pub fn identity_field(mut self, identity_field: &'a str) -> Self {
        self.identity_field = identity_field;
        self
    }

    /// Fire lifecycle events through `hooks`
    pub fn with_hooks(mut self, hooks: HookContext<'a>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    fn fire(&self, event: Event, payload: &mut HookPayload<'_>) -> Result<()> {
        match &self.hooks {
            Some(hooks) => hooks.fire(event, payload),
            None => Ok(()),
        }
    }

    /// Compute the insert document (`is_update == false`) or update set
    ///
    /// `live` is never modified; hooks operate on a working copy. Filter
    /// rewrites are reported in [`DiffOutcome::rewritten`].
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when a filter rejects a value
    /// - [`Error::StructuralConflict`] when a field switched between array
    ///   and document
    /// - [`Error::Misuse`] when the tree holds an unsaved record
    /// - any error raised by a hook
    pub fn compute(&self, live: &Document, snapshot: &Document, is_update: bool) -> Result<DiffOutcome> {
        let mut working = live.clone();
        normalize_references(&mut working, self.identity_field)?;

        self.fire(
            Event::before_validate_for(is_update),
            &mut HookPayload::Fields(&mut working),
        )?;
        self.fire(Event::BeforeValidate, &mut HookPayload::Fields(&mut working))?;

        let mut pipeline = FilterPipeline::new(self.filters);
        let mut computed = if is_update {
            Computed::Update(self.update_set(&working, snapshot, &mut pipeline)?)
        } else {
            Computed::Insert(insert_document(&working, &mut pipeline)?)
        };
        let rewritten = pipeline.into_rewritten();

        if computed.is_empty() {
            debug!(target: "docmap::diff", is_update, "Nothing to persist");
            return Ok(DiffOutcome {
                computed,
                rewritten,
            });
        }

        self.fire(
            Event::after_validate_for(is_update),
            &mut HookPayload::Fields(&mut working),
        )?;
        match &mut computed {
            Computed::Insert(doc) => self.fire(Event::AfterValidate, &mut HookPayload::Insert(doc))?,
            Computed::Update(set) => self.fire(Event::AfterValidate, &mut HookPayload::Update(set))?,
        }

        debug!(
            target: "docmap::diff",
            is_update,
            entries = computed.len(),
            rewritten = rewritten.len(),
            "Computed changes"
        );
        Ok(DiffOutcome {
            computed,
            rewritten,
        })
    }

    fn update_set(
        &self,
        live: &Document,
        snapshot: &Document,
        pipeline: &mut FilterPipeline<'_, F>,
    ) -> Result<UpdateSet> {
        let mut update = UpdateSet::new();

        for (field, value) in live {
            if value.is_empty() {
                continue;
            }
            let past = snapshot.get(field);
            match classify(value, past) {
                Change::Unchanged => {}
                Change::Conflict => return Err(Error::structural_conflict(field.as_str())),
                Change::Recurse(old) => {
                    let mut sub = UpdateSet::new();
                    if let Value::Document(new) = value {
                        diff_documents(field, new, old, &mut sub)?;
                    }
                    if sub.is_empty() {
                        continue;
                    }
                    let mut filtered = value.clone();
                    if pipeline.run(field, &mut filtered, past)? {
                        sub = rediff(field, &filtered, past)?;
                    }
                    update.merge(sub);
                }
                Change::Replace => {
                    let mut filtered = value.clone();
                    pipeline.run(field, &mut filtered, past)?;
                    update.set(field.as_str(), filtered);
                }
            }
        }

        for field in snapshot.keys() {
            if field == self.identity_field || field.starts_with('$') {
                continue;
            }
            if !live.contains_key(field) {
                update.unset(field.as_str());
            }
        }

        Ok(update)
    }
}

fn insert_document<F: Filterable + ?Sized>(
    live: &Document,
    pipeline: &mut FilterPipeline<'_, F>,
) -> Result<Document> {
    let mut out = Document::new();
    for (field, value) in live {
        if value.is_empty() {
            continue;
        }
        let mut filtered = value.clone();
        pipeline.run(field, &mut filtered, None)?;
        out.insert(field.as_str(), filtered);
    }
    Ok(out)
}

/// Instructions for a recursed field after its filter rewrote the value
fn rediff(field: &str, rewritten: &Value, past: Option<&Value>) -> Result<UpdateSet> {
    let mut sub = UpdateSet::new();
    match classify(rewritten, past) {
        Change::Unchanged => {}
        Change::Conflict => return Err(Error::structural_conflict(field)),
        Change::Recurse(old) => {
            if let Value::Document(new) = rewritten {
                diff_documents(field, new, old, &mut sub)?;
            }
        }
        Change::Replace => sub.set(field, rewritten.clone()),
    }
    Ok(sub)
}

fn diff_documents(prefix: &str, new: &Document, old: &Document, out: &mut UpdateSet) -> Result<()> {
    for (key, value) in new {
        let path = format!("{}.{}", prefix, key);
        match classify(value, old.get(key)) {
            Change::Unchanged => {}
            Change::Conflict => return Err(Error::structural_conflict(path)),
            Change::Recurse(old_sub) => {
                if let Value::Document(new_sub) = value {
                    diff_documents(&path, new_sub, old_sub, out)?;
                }
            }
            Change::Replace => out.set(path, value.clone()),
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            out.unset(format!("{}.{}", prefix, key));
        }
    }
    Ok(())
}

/// Reduce resolved values and annotated descriptors to bare references
///
/// Records become static references (legacy ones when untyped), result sets
/// become their dynamic descriptor and reference metadata is dropped.
///
/// # Errors
///
/// Returns [`Error::Misuse`] for a record that has no identity yet: it has
/// never been saved and cannot be referenced.
pub fn normalize_references(document: &mut Document, identity_field: &str) -> Result<()> {
    let mut path = DocPath::root();
    for (key, value) in document.iter_mut() {
        path.push_key(key.as_str());
        normalize_value(value, identity_field, &mut path)?;
        path.pop();
    }
    Ok(())
}

fn normalize_value(value: &mut Value, identity_field: &str, path: &mut DocPath) -> Result<()> {
    match value {
        Value::Record(record) => {
            let reference = record.reference(identity_field).ok_or_else(|| {
                Error::misuse(format!(
                    "field '{}' holds a record that has not been saved",
                    path
                ))
            })?;
            *value = Value::Reference(reference);
        }
        Value::ResultSet(rs) => {
            let mut reference = rs.reference.clone();
            reference.strip_metadata();
            *value = Value::Reference(reference);
        }
        Value::Reference(reference) => reference.strip_metadata(),
        Value::Document(doc) => {
            for (key, child) in doc.iter_mut() {
                path.push_key(key.as_str());
                normalize_value(child, identity_field, path)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter_mut().enumerate() {
                path.push_index(idx);
                normalize_value(child, identity_field, path)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}
