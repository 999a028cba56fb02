//! # Key Deriver
//!
//! Turns identifiers and query options into canonical string keys. Every read
//! and every write of the store goes through these functions, so a writer and a
//! reader can never disagree on where a value lives.
//!
//! A key is the canonical JSON form of the normalized value: object keys are
//! sorted and, for identifiers, every part is a string. Keys are therefore
//! stable across calls and processes and independent of property order.
//!
//! ```rust
//! use resource_cache::key::{resource_key, ResourceId};
//! use serde_json::json;
//!
//! let a = resource_key(&json!({"a": 1, "b": 2})).unwrap();
//! let b = resource_key(&json!({"b": "2", "a": "1"})).unwrap();
//! assert_eq!(a, b);
//!
//! assert_eq!(ResourceId::from(123).resource_key(), resource_key(&json!("123")).unwrap());
//! ```

use crate::error::IdTypeError;
use crate::options::FetchOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

macro_rules! canonical_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

canonical_key!(
    /// Key of a single resource.
    ResourceKey
);
canonical_key!(
    /// Key of a collection scope: the identifier without its `id` part.
    CollectionKey
);
canonical_key!(
    /// Key of a query variant inside a collection scope.
    QueryKey
);

impl CollectionKey {
    /// Scope of a collection with no identifying parameters.
    pub fn root() -> Self {
        Self(canonical_parts(&BTreeMap::new()))
    }
}

impl QueryKey {
    /// Variant of a collection requested without query parameters.
    pub fn empty() -> Self {
        Self(canonical_object(&Map::new()))
    }
}

/// A normalized resource identifier.
///
/// Bare scalars are wrapped as `{id: value}` and every part is stored as a
/// string, so `123`, `"123"` and `{"id": 123}` are the same identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(BTreeMap<String, String>);

impl ResourceId {
    /// Builds an identifier from named parts, e.g. `[("userId", "1"), ("id", "7")]`.
    pub fn from_parts<I, K, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Self(
            parts
                .into_iter()
                .map(|(name, value)| (name.into(), value.to_string()))
                .collect(),
        )
    }

    pub fn parts(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn get(&self, part: &str) -> Option<&str> {
        self.0.get(part).map(String::as_str)
    }

    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey(canonical_parts(&self.0))
    }

    pub fn collection_key(&self) -> CollectionKey {
        let mut scope = self.0.clone();
        scope.remove("id");
        CollectionKey(canonical_parts(&scope))
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&canonical_parts(&self.0))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::from_parts([("id", id)])
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self::from_parts([("id", id)])
    }
}

macro_rules! numeric_id {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ResourceId {
                fn from(id: $ty) -> Self {
                    Self::from_parts([("id", id)])
                }
            }
        )*
    };
}

numeric_id!(i32, i64, u32, u64, usize);

impl TryFrom<&Value> for ResourceId {
    type Error = IdTypeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(_) | Value::Number(_) => Ok(Self::from_parts([("id", scalar(value)?)])),
            Value::Object(parts) => parts
                .iter()
                .map(|(name, part)| scalar(part).map(|part| (name.clone(), part)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self),
            other => Err(IdTypeError::new(kind(other))),
        }
    }
}

impl TryFrom<Value> for ResourceId {
    type Error = IdTypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

/// Derives the key of a single resource from an untyped identifier.
pub fn resource_key(id: &Value) -> Result<ResourceKey, IdTypeError> {
    Ok(ResourceId::try_from(id)?.resource_key())
}

/// Derives the collection scope of an identifier. `None` and `null` both
/// select the root scope.
pub fn collection_key(id: Option<&Value>) -> Result<CollectionKey, IdTypeError> {
    match id {
        None | Some(Value::Null) => Ok(CollectionKey::root()),
        Some(id) => Ok(ResourceId::try_from(id)?.collection_key()),
    }
}

/// Derives the query variant of a request. Absent options and an empty query
/// produce the same key.
pub fn query_key(opts: Option<&FetchOptions>) -> QueryKey {
    opts.map(FetchOptions::query_key)
        .unwrap_or_else(QueryKey::empty)
}

impl FetchOptions {
    pub fn query_key(&self) -> QueryKey {
        QueryKey(canonical_object(&self.query))
    }
}

fn scalar(value: &Value) -> Result<String, IdTypeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(IdTypeError::new(kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn canonical_parts(parts: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (name, value)) in parts.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(name.clone()).to_string());
        out.push(':');
        out.push_str(&Value::String(value.clone()).to_string());
    }
    out.push('}');
    out
}

fn canonical_object(map: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_canonical(&Value::Object(map.clone()), &mut out);
    out
}

/// Writes `value` as JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort_unstable();
            out.push('{');
            for (i, name) in names.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(name) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
