//! Change tracking and reference resolution for docmap
//!
//! This crate builds on `docmap-core`:
//! - Diff engine: live fields vs snapshot, producing insert documents or update sets
//! - Filters: per-field validation and rewrite during diffing
//! - Scanner and dereferencer: reference discovery and batched resolution
//! - Hooks: lifecycle events for models and global subscribers
//! - Store: the document store trait and an in-memory implementation
//! - Mapper: the facade tying models, hooks, configuration and the store together
//!
//! Nothing here installs a `tracing` subscriber; events are emitted under the
//! `docmap::diff`, `docmap::deref`, `docmap::mapper` and `docmap::store`
//! targets.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod deref;
pub mod diff;
pub mod filter;
pub mod hooks;
pub mod mapper;
pub mod model;
pub mod scanner;
pub mod store;

pub use config::{MapperConfig, SkipMode, CONFIG_FILE_NAME};
pub use cursor::Cursor;
pub use deref::{replay_query, Dereferencer, ResolveStats};
pub use diff::{normalize_references, Computed, DiffEngine, DiffOutcome};
pub use filter::{FilterPipeline, Filterable, NoFilters, Rejection};
pub use hooks::{Event, HookContext, HookPayload, HookRegistry};
pub use mapper::{Mapper, SaveOutcome};
pub use model::{namespace_for, Model, ModelDef, ModelRegistry};
pub use scanner::{scan, Discovered};
pub use store::{Capabilities, DocumentStore, MemoryStore, StoreCall};
