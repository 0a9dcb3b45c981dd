//! Test utilities for the ODM comprehensive tests
//!
//! Provides a small blog domain over the in-memory store:
//! - `Author` trims its name and lowercases its email
//! - `Post` lives in `posts` and caps title length
//! - `Tag` uses every default

use docmap::{
    Mapper, MapperConfig, MemoryStore, ModelDef, Namespace, Record, Rejection, SaveOutcome, Value,
};
use std::sync::Arc;

/// Longest title a post accepts
pub const MAX_TITLE: usize = 40;

/// Install a fmt subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Mapper and store wired with the blog models
pub struct Blog {
    pub store: Arc<MemoryStore>,
    pub mapper: Mapper,
}

impl Blog {
    pub fn new() -> Self {
        Self::with(MemoryStore::new(), MapperConfig::default())
    }

    pub fn with_config(config: MapperConfig) -> Self {
        let store = MemoryStore::new().with_identity_field(config.identity_field.as_str());
        Self::with(store, config)
    }

    pub fn with(store: MemoryStore, config: MapperConfig) -> Self {
        init_tracing();
        let store = Arc::new(store);
        let mapper =
            Mapper::with_config(store.clone(), config).expect("Failed to build test mapper");
        mapper.register(author_model());
        mapper.register(post_model());
        mapper.register(ModelDef::new("Tag"));
        Blog { store, mapper }
    }

    /// Namespace of a collection in the configured default database
    pub fn ns(&self, collection: &str) -> Namespace {
        Namespace::new(self.mapper.config().default_database.as_str(), collection)
    }

    pub fn author(&self, name: &str) -> Record {
        let mut author = self.mapper.create("Author").expect("Author is registered");
        author.set("name", name);
        self.save_new(&mut author);
        author
    }

    pub fn tag(&self, label: &str) -> Record {
        let mut tag = self.mapper.create("Tag").expect("Tag is registered");
        tag.set("label", label);
        self.save_new(&mut tag);
        tag
    }

    pub fn post(&self, title: &str, author: &Record) -> Record {
        let mut post = self.mapper.create("Post").expect("Post is registered");
        post.set("title", title).set("author", author.clone());
        self.save_new(&mut post);
        post
    }

    /// Save a record that must be new, returning its identity
    pub fn save_new(&self, record: &mut Record) -> Value {
        match self.mapper.save(record).expect("Failed to save record") {
            SaveOutcome::Inserted(id) => id,
            other => panic!("expected an insert, got {:?}", other),
        }
    }

    /// Stored document with identity `id`
    pub fn stored(&self, collection: &str, id: &Value) -> docmap::Document {
        let identity = self.mapper.config().identity_field.as_str();
        self.store
            .documents(&self.ns(collection))
            .into_iter()
            .find(|d| d.get(identity) == Some(id))
            .unwrap_or_else(|| panic!("no document {:?} in {}", id, collection))
    }
}

fn author_model() -> ModelDef {
    ModelDef::new("Author")
        .with_filter("name", |value, _past| match value {
            Value::String(s) if !s.trim().is_empty() => Ok(Value::from(s.trim())),
            _ => Err(Rejection::new("name must be a non-blank string")),
        })
        .with_filter("email", |value, _past| match value {
            Value::String(s) if s.contains('@') => Ok(Value::from(s.to_lowercase())),
            _ => Err(Rejection::new("invalid email")),
        })
}

fn post_model() -> ModelDef {
    ModelDef::new("Post")
        .with_collection("posts")
        .with_filter("title", |value, _past| match value {
            Value::String(s) if s.chars().count() > MAX_TITLE => {
                Err(Rejection::new(format!("title longer than {}", MAX_TITLE)))
            }
            other => Ok(other),
        })
}
