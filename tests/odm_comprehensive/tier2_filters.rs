//! Tier 2: Field Filters
//!
//! Filters see each outgoing top-level value once. Rewrites land in the
//! store and on the live record; a rejection aborts the save.

use crate::test_utils::{Blog, MAX_TITLE};
use docmap::{doc, Error, Mapper, MemoryStore, ModelDef, Rejection, SaveOutcome, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn tier2_rewrite_reaches_store_and_record() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "  Ann  ").set("email", "Ann@Example.ORG");
    let id = blog.save_new(&mut author);

    assert_eq!(author.get("name"), Some(&Value::from("Ann")));
    assert_eq!(author.get("email"), Some(&Value::from("ann@example.org")));
    let stored = blog.stored("author", &id);
    assert_eq!(stored.get("name"), Some(&Value::from("Ann")));
    assert_eq!(stored.get("email"), Some(&Value::from("ann@example.org")));

    assert_eq!(blog.mapper.save(&mut author).unwrap(), SaveOutcome::Unchanged);
}

#[test]
fn tier2_rejection_names_field_and_blocks_write() {
    let blog = Blog::new();
    let mut author = blog.author("Ann");
    blog.store.clear_calls();

    author.set("email", "nowhere");
    let err = blog.mapper.save(&mut author).unwrap_err();
    match err {
        Error::Validation { field, reason } => {
            assert_eq!(field, "email");
            assert_eq!(reason, "invalid email");
        }
        other => panic!("expected validation error, got {other}"),
    }
    assert!(blog.store.calls().is_empty());
    assert!(author.snapshot().get("email").is_none());
}

#[test]
fn tier2_long_title_rejected() {
    let blog = Blog::new();
    let ann = blog.author("Ann");
    let mut post = blog.mapper.create("Post").unwrap();
    post.set("title", "x".repeat(MAX_TITLE + 1)).set("author", ann);
    assert!(matches!(
        blog.mapper.save(&mut post),
        Err(Error::Validation { ref field, .. }) if field == "title"
    ));
}

#[test]
fn tier2_filter_sees_past_value() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    mapper.register(ModelDef::new("Doc").with_filter("version", |value, past| {
        let next = value.as_int().unwrap_or(0);
        let prev = past.and_then(Value::as_int).unwrap_or(0);
        if next > prev {
            Ok(value)
        } else {
            Err(Rejection::new(format!("version must grow past {prev}")))
        }
    }));

    let mut d = mapper.create("Doc").unwrap();
    d.set("version", 2);
    mapper.save(&mut d).unwrap();

    d.set("version", 1);
    let err = mapper.save(&mut d).unwrap_err();
    assert!(err.to_string().contains("version must grow past 2"));

    d.set("version", 3);
    assert!(matches!(mapper.save(&mut d).unwrap(), SaveOutcome::Updated(_)));
}

#[test]
fn tier2_filter_skipped_for_unchanged_fields() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    mapper.register(ModelDef::new("Doc").with_filter("body", move |value, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }));

    let mut d = mapper.create("Doc").unwrap();
    d.set("body", "text").set("n", 1);
    mapper.save(&mut d).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    d.set("n", 2);
    mapper.save(&mut d).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    d.set("body", "new text");
    mapper.save(&mut d).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn tier2_nested_field_filtered_once_and_rediffed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let store = Arc::new(MemoryStore::new());
    let mapper = Mapper::new(store.clone());
    mapper.register(ModelDef::new("Doc").with_filter("meta", move |value, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut meta = value.as_document().cloned().unwrap_or_default();
        meta.insert("touched", true);
        Ok(Value::from(meta))
    }));

    let mut d = mapper.create("Doc").unwrap();
    d.set("meta", doc! { "a" => 1, "b" => 2 });
    mapper.save(&mut d).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    d.fields_mut()
        .get_mut("meta")
        .and_then(Value::as_document_mut)
        .unwrap()
        .insert("a", 5);
    let SaveOutcome::Updated(update) = mapper.save(&mut d).unwrap() else {
        panic!("expected update");
    };
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(update.get("meta.a"), Some(&Value::Int(5)));
    assert_eq!(update.len(), 1);
}
