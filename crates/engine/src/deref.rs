//! Reference resolution
//!
//! [`Dereferencer::resolve`] replaces the references found by
//! [`scan`](crate::scanner::scan) with the objects they name:
//!
//! 1. **Legacy** references (no target type) are fetched one at a time from
//!    the collection they name. This is the slow path and is logged as such.
//! 2. **Dynamic** references re-issue their stored query against the target
//!    model's collection and become a [`ResultSet`].
//! 3. **Static** references are grouped by target type. Each group costs a
//!    single `find_by_ids` round trip for its distinct ids; the reply must
//!    contain exactly one document per distinct id.
//!
//! Every lookup completes before the tree is touched, so a failed resolution
//! leaves the document as it was. Resolution is shallow: references inside
//! the loaded records stay unresolved.

use crate::config::{MapperConfig, SkipMode};
use crate::model::{namespace_for, ModelRegistry};
use crate::scanner::Discovered;
use crate::store::DocumentStore;
use docmap_core::{
    set_at_path, DocPath, Document, Error, Record, ReferenceKind, Result, ResultSet, StoredQuery,
    Value,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Counters from one resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Legacy references resolved
    pub legacy: usize,
    /// Dynamic references resolved
    pub dynamic: usize,
    /// Static references resolved
    pub static_refs: usize,
    /// `find_by_ids` round trips spent on static references
    pub batches: usize,
}

impl ResolveStats {
    /// Total references resolved
    pub fn total(&self) -> usize {
        self.legacy + self.dynamic + self.static_refs
    }
}

type Splice = (DocPath, Value);

/// Resolves discovered references against a store
pub struct Dereferencer<'a> {
    store: &'a dyn DocumentStore,
    models: &'a ModelRegistry,
    config: &'a MapperConfig,
}

impl<'a> Dereferencer<'a> {
    /// Resolver over `store`, looking target types up in `models`
    pub fn new(store: &'a dyn DocumentStore, models: &'a ModelRegistry, config: &'a MapperConfig) -> Self {
        Dereferencer {
            store,
            models,
            config,
        }
    }

    /// Resolve `discovered` and splice the results into `document`
    ///
    /// # Errors
    ///
    /// - [`Error::ReferenceIntegrity`] when a lookup returns the wrong number
    ///   of documents
    /// - [`Error::UnsupportedCapability`] for a dynamic reference on a store
    ///   without query replay
    /// - [`Error::Misuse`] for an unknown target type or a reply document
    ///   lacking the requested identity
    /// - any store error
    pub fn resolve(&self, document: &mut Document, discovered: Vec<Discovered>) -> Result<ResolveStats> {
        let mut stats = ResolveStats::default();
        let mut legacy = Vec::new();
        let mut dynamic = Vec::new();
        let mut by_type: BTreeMap<String, Vec<Discovered>> = BTreeMap::new();

        for found in discovered {
            match (found.reference.kind(), found.reference.target_type()) {
                (ReferenceKind::Static, Some(target_type)) => by_type
                    .entry(target_type.to_string())
                    .or_default()
                    .push(found),
                (ReferenceKind::Dynamic, _) => dynamic.push(found),
                _ => legacy.push(found),
            }
        }

        let mut splices: Vec<Splice> = Vec::new();

        for found in &legacy {
            splices.push(self.resolve_legacy(found)?);
            stats.legacy += 1;
        }

        for found in &dynamic {
            splices.push(self.resolve_dynamic(found)?);
            stats.dynamic += 1;
        }

        let groups: Vec<(&String, &Vec<Discovered>)> = by_type.iter().collect();
        // Collecting into a Result stops issuing batches after the first failure.
        let batches: Vec<Vec<Splice>> = if self.config.parallel_batches && groups.len() > 1 {
            groups
                .par_iter()
                .map(|(target_type, refs)| self.resolve_batch(target_type, refs))
                .collect::<Result<_>>()?
        } else {
            groups
                .iter()
                .map(|(target_type, refs)| self.resolve_batch(target_type, refs))
                .collect::<Result<_>>()?
        };
        for batch in batches {
            stats.static_refs += batch.len();
            stats.batches += 1;
            splices.extend(batch);
        }

        for (path, value) in splices {
            set_at_path(document, &path, value)?;
        }

        debug!(
            target: "docmap::deref",
            legacy = stats.legacy,
            dynamic = stats.dynamic,
            static_refs = stats.static_refs,
            batches = stats.batches,
            "Resolved references"
        );
        Ok(stats)
    }

    fn resolve_legacy(&self, found: &Discovered) -> Result<Splice> {
        let reference = &found.reference;
        let id = reference.id().ok_or_else(|| {
            Error::misuse(format!("reference at '{}' has no '$id'", found.path))
        })?;
        let namespace = reference.namespace(&self.config.default_database);
        warn!(
            target: "docmap::deref",
            namespace = %namespace,
            path = %found.path,
            "Resolving untyped reference with a dedicated lookup"
        );

        let mut documents = self.store.find_by_ids(&namespace, std::slice::from_ref(id))?;
        if documents.len() != 1 {
            return Err(Error::ReferenceIntegrity {
                target_type: reference.collection().to_string(),
                expected: 1,
                actual: documents.len(),
            });
        }
        let document = documents.remove(0);
        let record = Record::loaded(None, namespace, document).resolved_from(reference.clone());
        Ok((found.path.clone(), Value::from(record)))
    }

    fn resolve_dynamic(&self, found: &Discovered) -> Result<Splice> {
        if !self.store.capabilities().query_replay {
            return Err(Error::UnsupportedCapability(
                "dynamic references need a store that can replay queries".to_string(),
            ));
        }
        let reference = &found.reference;
        let (Some(target_type), Some(stored)) = (reference.target_type(), reference.query()) else {
            return Err(Error::misuse(format!(
                "reference at '{}' is not dynamic",
                found.path
            )));
        };
        let model = self.models.get(target_type)?;
        let namespace = namespace_for(model.as_ref(), &self.config.default_database);
        let query = replay_query(stored, self.config.skip_mode);

        let documents = self.store.find_by_query(&namespace, &query)?;
        debug!(
            target: "docmap::deref",
            target_type,
            results = documents.len(),
            "Replayed dynamic reference"
        );
        let records = documents
            .into_iter()
            .map(|d| Record::loaded(Some(target_type.to_string()), namespace.clone(), d))
            .collect();
        let result = ResultSet {
            records,
            reference: reference.clone(),
        };
        Ok((found.path.clone(), Value::ResultSet(result)))
    }

    fn resolve_batch(&self, target_type: &str, refs: &[Discovered]) -> Result<Vec<Splice>> {
        let model = self.models.get(target_type)?;
        let namespace = namespace_for(model.as_ref(), &self.config.default_database);

        let mut ids: Vec<Value> = Vec::new();
        for found in refs {
            let id = static_id(found)?;
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        debug!(
            target: "docmap::deref",
            target_type,
            references = refs.len(),
            ids = ids.len(),
            "Fetching reference batch"
        );
        let documents = self.store.find_by_ids(&namespace, &ids)?;
        if documents.len() != ids.len() {
            warn!(
                target: "docmap::deref",
                target_type,
                expected = ids.len(),
                actual = documents.len(),
                "Reference batch size mismatch"
            );
            return Err(Error::ReferenceIntegrity {
                target_type: target_type.to_string(),
                expected: ids.len(),
                actual: documents.len(),
            });
        }

        let identity_field = self.config.identity_field.as_str();
        let mut splices = Vec::with_capacity(refs.len());
        for found in refs {
            let id = static_id(found)?;
            let document = documents
                .iter()
                .find(|d| d.get(identity_field) == Some(id))
                .ok_or_else(|| {
                    Error::misuse(format!(
                        "store reply for '{}' has no document with {} {:?}",
                        target_type, identity_field, id
                    ))
                })?;
            let record = Record::loaded(Some(target_type.to_string()), namespace.clone(), document.clone())
                .resolved_from(found.reference.clone());
            splices.push((found.path.clone(), Value::from(record)));
        }
        Ok(splices)
    }
}

fn static_id(found: &Discovered) -> Result<&Value> {
    found
        .reference
        .id()
        .ok_or_else(|| Error::misuse(format!("reference at '{}' has no '$id'", found.path)))
}

/// Query actually sent when replaying `stored`
pub fn replay_query(stored: &StoredQuery, mode: SkipMode) -> StoredQuery {
    let mut query = stored.clone();
    if mode == SkipMode::LegacyAlias {
        query.skip = 0;
    }
    query
}
