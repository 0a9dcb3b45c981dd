//! Document store abstraction
//!
//! The mapper talks to storage only through [`DocumentStore`]. A store is an
//! opaque service: it owns connections, wire protocol and cursors, and the
//! mapper hands it namespaces, documents, update sets and stored queries.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! embedded callers.

mod memory;

pub use memory::{MemoryStore, StoreCall};

use docmap_core::{Document, Namespace, Result, StoredQuery, UpdateSet, Value};

/// Optional features a store may lack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The connector can hand back the query behind a result and re-issue it
    /// later, which dynamic references need
    pub query_replay: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities { query_replay: true }
    }
}

/// Storage backend for mapped documents
///
/// Thread safety: all methods may be called concurrently from several
/// threads, since reference batches can be resolved in parallel.
pub trait DocumentStore: Send + Sync {
    /// Insert `document`, returning its identity value
    ///
    /// The store assigns an identity when the document carries none.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the identity is taken.
    fn insert(&self, namespace: &Namespace, document: Document) -> Result<Value>;

    /// Apply `update` to the document whose identity is `id`
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn update(&self, namespace: &Namespace, id: &Value, update: &UpdateSet) -> Result<()>;

    /// Fetch every document whose identity is in `ids`, in one round trip
    ///
    /// Each matching document is returned once, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn find_by_ids(&self, namespace: &Namespace, ids: &[Value]) -> Result<Vec<Document>>;

    /// Run `query` and return the matching documents in store order
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn find_by_query(&self, namespace: &Namespace, query: &StoredQuery) -> Result<Vec<Document>>;

    /// Remove every document matching `selector`, returning how many went
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remove(&self, namespace: &Namespace, selector: &Document) -> Result<u64>;

    /// Features this store supports
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}
