//! Query-bound iteration
//!
//! A [`Cursor`] holds the documents a query returned and hands them out as
//! detached [`Record`]s. Records never point back at their cursor, so only
//! the cursor can iterate.

use docmap_core::{Document, Error, Namespace, Record, Reference, Result, StoredQuery};

/// Documents returned by a query, with the query that produced them
#[derive(Debug, Clone)]
pub struct Cursor {
    model: String,
    namespace: Namespace,
    query: StoredQuery,
    documents: Vec<Document>,
    position: usize,
    replayable: bool,
}

impl Cursor {
    pub(crate) fn new(
        model: impl Into<String>,
        namespace: Namespace,
        query: StoredQuery,
        documents: Vec<Document>,
        replayable: bool,
    ) -> Self {
        Cursor {
            model: model.into(),
            namespace,
            query,
            documents,
            position: 0,
            replayable,
        }
    }

    /// Model type of the records
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Namespace that was queried
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Query that produced the documents
    pub fn query(&self) -> &StoredQuery {
        &self.query
    }

    /// Total number of documents, regardless of position
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    /// True when the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Raw document `next` would yield
    pub fn current(&self) -> Option<&Document> {
        self.documents.get(self.position)
    }

    /// Detached copy of the record `next` would yield, without advancing
    pub fn detach(&self) -> Option<Record> {
        self.current().map(|d| self.record(d))
    }

    /// Go back to the first document
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Dynamic reference that replays this cursor's query
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCapability`] when the store that produced
    /// the cursor cannot replay queries.
    pub fn dynamic_reference(&self) -> Result<Reference> {
        if !self.replayable {
            return Err(Error::UnsupportedCapability(
                "the store cannot replay the query behind this cursor".to_string(),
            ));
        }
        Ok(Reference::new_dynamic(
            self.model.as_str(),
            &self.namespace,
            self.query.clone(),
        ))
    }

    fn record(&self, document: &Document) -> Record {
        Record::loaded(Some(self.model.clone()), self.namespace.clone(), document.clone())
    }
}

impl Iterator for Cursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let document = self.documents.get(self.position)?;
        let record = self.record(document);
        self.position += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.documents.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Cursor {}
