//! Tier 6: Property-Based
//!
//! Random edit/save sequences must keep three views in agreement: the
//! record's live fields, its snapshot, and the stored document.

use crate::test_utils::Blog;
use docmap::{doc, Document, SaveOutcome, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    Set(String, i64),
    SetNested(String, String, i64),
    Remove(String),
    Save,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => ("[a-d]", 1i64..100).prop_map(|(k, v)| Edit::Set(k, v)),
        2 => ("[e-f]", "[x-z]", 1i64..100).prop_map(|(k, s, v)| Edit::SetNested(k, s, v)),
        1 => "[a-f]".prop_map(Edit::Remove),
        2 => Just(Edit::Save),
    ]
}

fn apply(fields: &mut Document, edit: &Edit) {
    match edit {
        Edit::Set(k, v) => {
            fields.insert(k.as_str(), *v);
        }
        Edit::SetNested(k, sub, v) => {
            let slot = fields
                .entry(k.clone())
                .or_insert_with(|| Value::from(Document::new()));
            if !slot.is_document() {
                *slot = Value::from(Document::new());
            }
            if let Some(d) = slot.as_document_mut() {
                d.insert(sub.as_str(), *v);
            }
        }
        Edit::Remove(k) => {
            fields.remove(k);
        }
        Edit::Save => {}
    }
}

fn without_empties(document: &Document) -> Document {
    document
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn tier6_snapshot_store_and_live_agree(edits in prop::collection::vec(edit(), 1..24)) {
        let blog = Blog::new();
        let mut tag = blog.mapper.create("Tag").unwrap();
        tag.set("label", "seed");
        let id = blog.save_new(&mut tag);

        for e in &edits {
            apply(tag.fields_mut(), e);
            if !matches!(e, Edit::Save) {
                continue;
            }
            let outcome = blog.mapper.save(&mut tag).unwrap();
            let stored = blog.stored("tag", &id);
            prop_assert_eq!(&stored, tag.snapshot());
            prop_assert_eq!(without_empties(tag.fields()), without_empties(&stored));
            if let SaveOutcome::Updated(update) = outcome {
                prop_assert!(!update.is_unset("_id"));
            }
        }

        blog.mapper.save(&mut tag).unwrap();
        prop_assert_eq!(blog.mapper.save(&mut tag).unwrap(), SaveOutcome::Unchanged);
        prop_assert_eq!(blog.store.documents(&blog.ns("tag")).len(), 1);
        prop_assert_ne!(blog.stored("tag", &id), doc! {});
    }
}
