//! Wire form of document trees
//!
//! Converts [`Value`] and [`Document`] to and from `serde_json` values. This
//! is the persisted shape of a tree:
//!
//! - references become `{"$ref", "$id", "$db", "class"[, "dynamic"]}`
//!   mappings; metadata keys are dropped
//! - resolved records and result sets collapse back to their descriptor
//! - any mapping with a string `$ref` and either `$id` or `dynamic` is read
//!   back as a [`Reference`], extra keys becoming its metadata
//!
//! `Serialize`/`Deserialize` for `Value` and `Document` go through this form.

use crate::error::{Error, Result};
use crate::record::{Record, DEFAULT_IDENTITY_FIELD};
use crate::reference::{
    Reference, StoredQuery, CLASS_KEY, DB_KEY, DESCRIPTOR_KEYS, DYNAMIC_KEY, ID_KEY, REF_KEY,
};
use crate::value::{Document, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Map;

type JsonMap = Map<String, serde_json::Value>;

impl Value {
    /// Convert to the wire form, treating `_id` as the identity field
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_with(DEFAULT_IDENTITY_FIELD)
    }

    /// Convert to the wire form
    ///
    /// Records that have a value under `identity_field` collapse to their
    /// descriptor; unsaved ones are written out as plain documents.
    pub fn to_json_with(&self, identity_field: &str) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(
                a.iter().map(|v| v.to_json_with(identity_field)).collect(),
            ),
            Value::Document(d) => d.to_json_with(identity_field),
            Value::Reference(r) => r.to_json(),
            Value::Record(r) => record_to_json(r, identity_field),
            Value::ResultSet(rs) => rs.reference.to_json(),
        }
    }

    /// Read a value from the wire form
    ///
    /// # Errors
    ///
    /// Returns an error if a reference-shaped mapping carries a malformed
    /// stored query.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(
                a.into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(map) => {
                if is_reference_shape(&map) {
                    Value::Reference(Reference::from_json_map(map)?)
                } else {
                    Value::Document(Document::from_json_map(map)?)
                }
            }
        })
    }
}

fn record_to_json(record: &Record, identity_field: &str) -> serde_json::Value {
    match record.reference(identity_field) {
        Some(reference) => reference.to_json(),
        None => record.fields().to_json_with(identity_field),
    }
}

impl Document {
    /// Convert to a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_with(DEFAULT_IDENTITY_FIELD)
    }

    /// Convert to a JSON object, reading record identities from `identity_field`
    pub fn to_json_with(&self, identity_field: &str) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_json_with(identity_field)))
                .collect(),
        )
    }

    /// Read a document from a JSON object
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not an object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Document::from_json_map(map),
            other => Err(Error::Serialization(format!(
                "expected an object for a document, found {}",
                other
            ))),
        }
    }

    fn from_json_map(map: JsonMap) -> Result<Self> {
        map.into_iter()
            .map(|(k, v)| Ok::<_, Error>((k, Value::from_json(v)?)))
            .collect()
    }
}

/// True for mappings that carry a reference descriptor
pub fn is_reference_shape(map: &JsonMap) -> bool {
    matches!(map.get(REF_KEY), Some(serde_json::Value::String(_)))
        && (map.contains_key(ID_KEY) || map.contains_key(DYNAMIC_KEY))
}

impl Reference {
    /// Descriptor in wire form (metadata excluded)
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = JsonMap::new();
        out.insert(REF_KEY.to_string(), self.collection().into());
        out.insert(
            ID_KEY.to_string(),
            self.id().map(Value::to_json).unwrap_or(serde_json::Value::Null),
        );
        if let Some(db) = self.database() {
            out.insert(DB_KEY.to_string(), db.into());
        }
        if let Some(class) = self.target_type() {
            out.insert(CLASS_KEY.to_string(), class.into());
        }
        if let Some(query) = self.query() {
            out.insert(DYNAMIC_KEY.to_string(), query.to_json());
        }
        serde_json::Value::Object(out)
    }

    fn from_json_map(mut map: JsonMap) -> Result<Self> {
        let collection = match map.remove(REF_KEY) {
            Some(serde_json::Value::String(s)) => s,
            _ => return Err(Error::Serialization("reference without '$ref'".to_string())),
        };
        let id = match map.remove(ID_KEY) {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(Value::from_json(v)?),
        };
        let database = optional_string(&mut map, DB_KEY)?;
        let target_type = optional_string(&mut map, CLASS_KEY)?;
        let query = match map.remove(DYNAMIC_KEY) {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(StoredQuery::from_json(v)?),
        };
        debug_assert!(DESCRIPTOR_KEYS.iter().all(|k| !map.contains_key(*k)));
        let metadata = Document::from_json_map(map)?;
        Ok(Reference::from_parts(
            collection,
            id,
            database,
            target_type,
            query,
            metadata,
        ))
    }
}

fn optional_string(map: &mut JsonMap, key: &str) -> Result<Option<String>> {
    match map.remove(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::Serialization(format!(
            "reference key '{}' must be a string, found {}",
            key, other
        ))),
    }
}

impl StoredQuery {
    /// Wire form: `{"filter": {...}, "fields": [...], "limit": n, "skip": n}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "filter": self.filter.to_json(),
            "fields": self.fields,
            "limit": self.limit,
            "skip": self.skip,
        })
    }

    /// Read a stored query; missing keys take their defaults
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut map) = json else {
            return Err(Error::Serialization(
                "stored query must be an object".to_string(),
            ));
        };
        let filter = match map.remove("filter") {
            None | Some(serde_json::Value::Null) => Document::new(),
            Some(v) => Document::from_json(v)?,
        };
        let fields = match map.remove("fields") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v)?,
        };
        let limit = count(&map, "limit")?;
        let skip = count(&map, "skip")?;
        Ok(StoredQuery {
            filter,
            fields,
            limit,
            skip,
        })
    }
}

fn count(map: &JsonMap, key: &str) -> Result<u64> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(v) => v.as_u64().ok_or_else(|| {
            Error::Serialization(format!("'{}' must be a non-negative integer, found {}", key, v))
        }),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Document::from_json(json).map_err(serde::de::Error::custom)
    }
}
