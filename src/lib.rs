//! docmap - change tracking and reference resolution for document mappers
//!
//! Given an object that was loaded from a document store and then mutated,
//! docmap computes the minimal `$set`/`$unset` instructions needed to persist
//! it. Given a document that embeds references to other documents, it
//! resolves them with as few store round trips as possible.
//!
//! # Quick Start
//!
//! ```
//! use docmap::{doc, Mapper, MemoryStore, ModelDef, SaveOutcome, Value};
//! use std::sync::Arc;
//!
//! let mapper = Mapper::new(Arc::new(MemoryStore::new()));
//! mapper.register(ModelDef::new("Author"));
//! mapper.register(ModelDef::new("Post"));
//!
//! let mut author = mapper.create("Author")?;
//! author.set("name", "Alice");
//! mapper.save(&mut author)?;
//!
//! let mut post = mapper.create("Post")?;
//! post.set("title", "Hello").set("author", author.clone());
//! mapper.save(&mut post)?;
//!
//! let mut loaded = mapper.find("Post", doc! { "title" => "Hello" })?.next().unwrap();
//! mapper.resolve(&mut loaded)?;
//! let resolved = loaded.get("author").and_then(Value::as_record).unwrap();
//! assert_eq!(resolved.get("name"), Some(&Value::from("Alice")));
//! assert_eq!(mapper.save(&mut loaded)?, SaveOutcome::Unchanged);
//! # Ok::<(), docmap::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`docmap_core`]: the document tree, references, records, paths and
//!   update sets
//! - [`docmap_engine`]: diffing, filters, hooks, reference resolution, the
//!   store trait and the [`Mapper`] facade

pub use docmap_core::*;
pub use docmap_engine::*;
