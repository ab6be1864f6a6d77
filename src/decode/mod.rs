//! Response decoding
//!
//! Turns a parsed response body into [`Record`]s. The records array is found
//! at a dotted path (`items` for the Webex listing endpoints); a body without
//! that array is a decode error, never an empty page.

use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Trait for decoding response bodies into records
pub trait RecordDecoder: Send + Sync {
    /// Decode the records of one page, in response order
    fn decode(&self, body: &Value) -> Result<Vec<Record>>;
}

/// Decoder for JSON bodies carrying an array of objects
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    record_path: String,
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::new("items")
    }
}

impl JsonDecoder {
    /// `record_path` of `""` or `"$"` means the body itself is the array.
    pub fn new(record_path: impl Into<String>) -> Self {
        Self {
            record_path: record_path.into(),
        }
    }

    pub fn record_path(&self) -> &str {
        &self.record_path
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &Value) -> Result<Vec<Record>> {
        let items = lookup(body, &self.record_path).ok_or_else(|| {
            Error::decode(format!(
                "response is missing the '{}' records array",
                self.record_path
            ))
        })?;

        let Value::Array(items) = items else {
            return Err(Error::decode(format!(
                "'{}' in the response is not an array",
                self.record_path
            )));
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_json(item.clone()).map_err(|e| match e {
                    Error::Decode { message } => Error::decode(format!("record {i}: {message}")),
                    other => other,
                })
            })
            .collect()
    }
}

/// Walk a dotted path (`$.` prefix optional) through nested objects.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        _ => None,
    })
}
