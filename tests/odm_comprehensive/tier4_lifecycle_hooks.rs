//! Tier 4: Lifecycle Hooks

use crate::test_utils::Blog;
use docmap::{doc, Error, Event, HookPayload, SaveOutcome, Value};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn tier4_global_hooks_see_every_model() {
    let blog = Blog::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    blog.mapper.hooks().on_global(Event::AfterCreate, move |model, _| {
        sink.lock().push(model.to_string());
        Ok(())
    });

    let ann = blog.author("Ann");
    blog.tag("rust");
    blog.post("Hello", &ann);
    assert_eq!(*seen.lock(), vec!["Author", "Tag", "Post"]);
}

#[test]
fn tier4_after_validate_can_extend_update() {
    let blog = Blog::new();
    blog.mapper.hooks().on("Author", Event::AfterValidate, |payload| {
        if let Some(update) = payload.update_mut() {
            update.set("revision", "bumped");
        }
        Ok(())
    });

    let mut author = blog.author("Ann");
    author.set("name", "Anne");
    let SaveOutcome::Updated(update) = blog.mapper.save(&mut author).unwrap() else {
        panic!("expected update");
    };
    assert_eq!(update.get("revision"), Some(&Value::from("bumped")));

    let id = author.get("_id").unwrap();
    assert_eq!(blog.stored("author", id).get("revision"), Some(&Value::from("bumped")));
    assert_eq!(author.snapshot().get("revision"), Some(&Value::from("bumped")));
}

#[test]
fn tier4_before_validate_edits_working_copy_only() {
    let blog = Blog::new();
    blog.mapper
        .hooks()
        .on("Tag", Event::BeforeValidateCreation, |payload| {
            if let HookPayload::Fields(fields) = payload {
                fields.insert("slug", "generated");
            }
            Ok(())
        });

    let mut tag = blog.mapper.create("Tag").unwrap();
    tag.set("label", "Rust");
    let id = blog.save_new(&mut tag);

    assert_eq!(blog.stored("tag", &id).get("slug"), Some(&Value::from("generated")));
    assert!(tag.get("slug").is_none());

    // The live copy lacks the hook's field, so the next save removes it
    let SaveOutcome::Updated(update) = blog.mapper.save(&mut tag).unwrap() else {
        panic!("expected update");
    };
    assert!(update.is_unset("slug"));
}

#[test]
fn tier4_hook_error_aborts_delete() {
    let blog = Blog::new();
    blog.mapper.hooks().on("Tag", Event::BeforeDelete, |payload| {
        let HookPayload::Selector(selector) = payload else {
            return Ok(());
        };
        Err(Error::Hook {
            event: Event::BeforeDelete.to_string(),
            reason: format!("refusing {:?}", selector.get("_id")),
        })
    });

    let mut tag = blog.tag("rust");
    assert!(matches!(blog.mapper.delete(&mut tag), Err(Error::Hook { .. })));
    assert_eq!(blog.store.documents(&blog.ns("tag")).len(), 1);
}

#[test]
fn tier4_clear_removes_subscriptions() {
    let blog = Blog::new();
    blog.mapper
        .hooks()
        .on("Tag", Event::BeforeCreate, |_| Err(Error::misuse("blocked")));
    assert_eq!(blog.mapper.hooks().subscriber_count("Tag", Event::BeforeCreate), 1);

    blog.mapper.hooks().clear();
    assert_eq!(blog.mapper.hooks().subscriber_count("Tag", Event::BeforeCreate), 0);
    blog.tag("rust");
}

#[test]
fn tier4_hook_sees_insert_document_with_references() {
    let blog = Blog::new();
    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    blog.mapper.hooks().on("Post", Event::AfterValidate, move |payload| {
        if let HookPayload::Insert(document) = payload {
            *sink.lock() = Some(document.clone());
        }
        Ok(())
    });

    let ann = blog.author("Ann");
    blog.post("Hello", &ann);

    let document = captured.lock().take().unwrap();
    assert_eq!(document.get("title"), Some(&Value::from("Hello")));
    assert!(document.get("author").unwrap().is_reference());
    assert!(document.get("_id").is_none());
    assert_ne!(document, doc! {});
}
