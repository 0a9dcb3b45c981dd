//! Tier 1: Change Tracking
//!
//! A record's snapshot always mirrors what the store holds, so each save
//! sends only what changed since the previous one.

use crate::test_utils::Blog;
use docmap::{doc, Error, SaveOutcome, StoreCall, Value};

#[test]
fn tier1_insert_then_update_sends_only_the_change() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author
        .set("name", "Ann")
        .set("profile", doc! { "city" => "Oslo", "langs" => vec!["no", "en"] });
    let id = blog.save_new(&mut author);

    author
        .fields_mut()
        .get_mut("profile")
        .and_then(Value::as_document_mut)
        .unwrap()
        .insert("city", "Bergen");

    let SaveOutcome::Updated(update) = blog.mapper.save(&mut author).unwrap() else {
        panic!("expected update");
    };
    assert_eq!(update.len(), 1);
    assert_eq!(update.get("profile.city"), Some(&Value::from("Bergen")));

    let stored = blog.stored("author", &id);
    assert_eq!(&stored, author.snapshot());
    assert_eq!(stored.get("name"), Some(&Value::from("Ann")));
}

#[test]
fn tier1_second_save_is_unchanged() {
    let blog = Blog::new();
    let mut author = blog.author("Ann");
    blog.store.clear_calls();

    assert_eq!(blog.mapper.save(&mut author).unwrap(), SaveOutcome::Unchanged);
    assert!(blog.store.calls().is_empty());
}

#[test]
fn tier1_removed_field_is_unset_in_store() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "Ann").set("bio", "writes");
    let id = blog.save_new(&mut author);

    author.remove("bio");
    let SaveOutcome::Updated(update) = blog.mapper.save(&mut author).unwrap() else {
        panic!("expected update");
    };
    assert!(update.is_unset("bio"));
    assert!(blog.stored("author", &id).get("bio").is_none());
}

#[test]
fn tier1_emptied_field_is_left_alone() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "Ann").set("karma", 7);
    let id = blog.save_new(&mut author);

    author.set("karma", 0);
    assert_eq!(blog.mapper.save(&mut author).unwrap(), SaveOutcome::Unchanged);
    assert_eq!(blog.stored("author", &id).get("karma"), Some(&Value::Int(7)));
}

#[test]
fn tier1_removing_identity_does_not_unset_it() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "Ann").set("bio", "x");
    let id = blog.save_new(&mut author);

    let update = {
        let mut copy = author.clone();
        copy.remove("_id");
        copy.remove("bio");
        blog.mapper.compute_update(&mut copy).unwrap()
    };
    let set = update.computed.as_update().unwrap();
    assert!(set.is_unset("bio"));
    assert!(!set.is_unset("_id"));
    assert_eq!(blog.stored("author", &id).get("_id"), Some(&id));
}

#[test]
fn tier1_structural_conflict_keeps_snapshot() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "Ann").set("links", vec!["a", "b"]);
    blog.save_new(&mut author);
    let snapshot = author.snapshot().clone();
    blog.store.clear_calls();

    author.set("links", doc! { "home" => "a" });
    let err = blog.mapper.save(&mut author).unwrap_err();
    assert!(matches!(err, Error::StructuralConflict { ref path } if path == "links"));
    assert_eq!(author.snapshot(), &snapshot);
    assert!(blog.store.calls().is_empty());
}

#[test]
fn tier1_delete_then_save_inserts_again() {
    let blog = Blog::new();
    let mut author = blog.author("Ann");
    assert!(blog.mapper.delete(&mut author).unwrap());
    assert!(blog.store.documents(&blog.ns("author")).is_empty());

    assert!(matches!(
        blog.mapper.save(&mut author).unwrap(),
        SaveOutcome::Inserted(_)
    ));
    assert_eq!(blog.store.documents(&blog.ns("author")).len(), 1);
}

#[test]
fn tier1_delete_of_unsaved_record_is_noop() {
    let blog = Blog::new();
    let mut author = blog.mapper.create("Author").unwrap();
    author.set("name", "Ann");
    assert!(!blog.mapper.delete(&mut author).unwrap());
    assert!(blog.store.calls().is_empty());
}

#[test]
fn tier1_saving_embedded_unsaved_record_is_misuse() {
    let blog = Blog::new();
    let ghost = blog.mapper.create("Author").unwrap();
    let mut post = blog.mapper.create("Post").unwrap();
    post.set("title", "t").set("author", ghost);

    let err = blog.mapper.save(&mut post).unwrap_err();
    assert!(matches!(err, Error::Misuse(ref msg) if msg.contains("author")));
}

#[test]
fn tier1_embedded_record_is_stored_as_reference() {
    let blog = Blog::new();
    let ann = blog.author("Ann");
    let post = blog.post("Hello", &ann);

    let id = post.get("_id").cloned().unwrap();
    let stored = blog.stored("posts", &id);
    let reference = stored.get("author").and_then(Value::as_reference).unwrap();
    assert_eq!(reference.id(), ann.get("_id"));
    assert_eq!(reference.target_type(), Some("Author"));
    assert!(post.get("author").unwrap().as_record().is_some());
}

#[test]
fn tier1_find_like_matches_reference_fields() {
    let blog = Blog::new();
    let ann = blog.author("Ann");
    let bob = blog.author("Bob");
    blog.post("one", &ann);
    blog.post("two", &bob);
    blog.post("three", &ann);
    blog.store.clear_calls();

    let mut probe = blog.mapper.create("Post").unwrap();
    probe.set("author", ann.clone());
    let titles: Vec<Value> = blog
        .mapper
        .find_like(&probe)
        .unwrap()
        .filter_map(|r| r.get("title").cloned())
        .collect();
    assert_eq!(titles, vec![Value::from("one"), Value::from("three")]);

    match &blog.store.calls()[0] {
        StoreCall::FindByQuery { query, .. } => {
            assert_eq!(query.filter, doc! { "author.$id" => ann.get("_id").cloned().unwrap() });
        }
        other => panic!("unexpected call {:?}", other),
    }
}
