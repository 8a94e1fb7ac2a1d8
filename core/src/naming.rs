//! Field naming conventions used on the wire.
//!
//! Rust types use snake_case field names. Backends expecting a different
//! convention get their keys rewritten on the way out (request payloads) and
//! looked up through the same transform on the way in (response records),
//! so one policy value governs both directions.

use serde_json::{Map, Value};

/// Naming convention a backend expects for object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldNaming {
    /// Keys are sent exactly as the Rust field names.
    #[default]
    AsIs,
    /// `entity_type` is sent as `entityType`.
    CamelCase,
}

impl FieldNaming {
    /// Map a snake_case field name to its wire name.
    pub fn apply(self, field: &str) -> String {
        match self {
            FieldNaming::AsIs => field.to_string(),
            FieldNaming::CamelCase => to_camel_case(field),
        }
    }

    /// Map a wire name back to its snake_case field name.
    pub fn invert(self, key: &str) -> String {
        match self {
            FieldNaming::AsIs => key.to_string(),
            FieldNaming::CamelCase => to_snake_case(key),
        }
    }

    /// Rewrite every object key in `value`, recursing through nested objects
    /// and arrays. String values are never touched.
    pub fn rename_keys(self, value: Value) -> Value {
        if self == FieldNaming::AsIs {
            return value;
        }
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (self.apply(&key), self.rename_keys(value)))
                    .collect::<Map<String, Value>>(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.rename_keys(item)).collect())
            }
            other => other,
        }
    }
}

/// `entity_type` → `entityType`. An underscore is dropped only when it is
/// followed by a lowercase ASCII letter, which keeps the transform
/// reversible for snake_case input.
pub fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('_', Some(next)) if next.is_ascii_lowercase() => {
                let upper = next.to_ascii_uppercase();
                chars.next();
                out.push(upper);
            }
            _ => out.push(c),
        }
    }
    out
}

/// `entityType` → `entity_type`.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
