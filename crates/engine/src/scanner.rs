//! Reference discovery
//!
//! Walks a document tree in stable pre-order and records every reference
//! descriptor with the path where it sits. Documents and arrays are entered;
//! a reference is a leaf; records and result sets that were already resolved
//! are left alone, which keeps resolution one level deep.

use docmap_core::{DocPath, Document, Reference, Value};

/// A reference and where it was found
#[derive(Debug, Clone, PartialEq)]
pub struct Discovered {
    /// The descriptor
    pub reference: Reference,
    /// Location in the scanned tree
    pub path: DocPath,
}

/// Collect every reference in `document`, in pre-order
pub fn scan(document: &Document) -> Vec<Discovered> {
    let mut found = Vec::new();
    let mut path = DocPath::root();
    scan_document(document, &mut path, &mut found);
    found
}

fn scan_document(document: &Document, path: &mut DocPath, found: &mut Vec<Discovered>) {
    for (key, value) in document {
        path.push_key(key.as_str());
        scan_value(value, path, found);
        path.pop();
    }
}

fn scan_value(value: &Value, path: &mut DocPath, found: &mut Vec<Discovered>) {
    match value {
        Value::Reference(reference) => found.push(Discovered {
            reference: reference.clone(),
            path: path.clone(),
        }),
        Value::Document(doc) => scan_document(doc, path, found),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                path.push_index(idx);
                scan_value(item, path, found);
                path.pop();
            }
        }
        _ => {}
    }
}
