//! Column derivation

use crate::types::Record;
use std::collections::HashSet;

/// Ordered union of record keys.
///
/// `pinned` come first in the order given (whether or not any record has
/// them), followed by the remaining keys in first-seen order across
/// `records`. The result is identical for identical input.
pub fn columns(records: &[Record], pinned: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for key in pinned {
        if seen.insert(key.as_str()) {
            out.push(key.clone());
        }
    }

    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                out.push(key.clone());
            }
        }
    }

    out
}
