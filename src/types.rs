//! Common types used throughout recordings-export
//!
//! This module contains the [`Record`] model and small shared enums.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type (insertion ordered)
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Record
// ============================================================================

/// One recording's metadata as returned by the listing endpoint.
///
/// Fields keep the order the API sent them in. Nested objects are flattened
/// into dotted keys (`serviceData.locationId`) and arrays are kept as their
/// compact JSON text, so every value is a string, number, boolean or null.
/// When a literal dotted key and a flattened key coincide, the one that
/// appears first is kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record(JsonObject);

impl Record {
    /// Build a record from one item of the records array.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(map) => {
                let mut fields = JsonObject::new();
                flatten_into(&mut fields, None, map);
                Ok(Self(fields))
            }
            other => Err(Error::decode(format!(
                "expected a JSON object for each record, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// The record identity (`id` field), if present.
    pub fn id(&self) -> Option<String> {
        self.0.get("id").and_then(scalar_text)
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render a field as a CSV cell. Missing fields and nulls are empty.
    pub fn cell(&self, key: &str) -> String {
        self.0.get(key).and_then(scalar_text).unwrap_or_default()
    }
}

fn flatten_into(out: &mut JsonObject, prefix: Option<&str>, map: JsonObject) {
    for (key, value) in map {
        let key = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key,
        };
        let value = match value {
            JsonValue::Object(inner) => {
                flatten_into(out, Some(&key), inner);
                continue;
            }
            JsonValue::Array(_) => JsonValue::String(value.to_string()),
            scalar => scalar,
        };

        // `"a.b": 1` and `"a": {"b": 2}` flatten to the same key; first one wins
        if out.contains_key(&key) {
            warn!(field = %key, "Duplicate field after flattening; keeping the first value");
            continue;
        }
        out.insert(key, value);
    }
}

/// Text form of a scalar JSON value; `None` for null.
fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
