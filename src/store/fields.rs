// SPDX-License-Identifier: MPL-2.0

//! Dotted-path field updates applied to an in-memory document.

use crate::remote::{Document, FieldOp, FieldUpdates, StoreError};
use serde_json::{Map, Value};

/// Apply every update to `doc`. On error `doc` may be partially updated, so
/// callers apply to a copy and commit only on success.
pub fn apply_updates(doc: &mut Document, updates: &FieldUpdates) -> Result<(), StoreError> {
    for (path, op) in updates.iter() {
        apply_one(doc, path, op)?;
    }
    Ok(())
}

fn apply_one(doc: &mut Document, path: &str, op: &FieldOp) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        // Firestore semantics: setting through a scalar replaces it with a map
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }

    let key = last.to_string();
    match op {
        FieldOp::Set(value) => {
            current.insert(key, value.clone());
        }
        FieldOp::Delete => {
            current.remove(&key);
        }
        FieldOp::Increment(by) => {
            let base = match current.get(&key) {
                None | Some(Value::Null) => 0,
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| invalid(path, "not an integer"))?,
                Some(_) => return Err(invalid(path, "increment on non-numeric field")),
            };
            current.insert(key, Value::from(base.saturating_add(*by)));
        }
        FieldOp::ArrayUnion(values) => {
            let entry = current.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = entry else {
                return Err(invalid(path, "array union on non-array field"));
            };
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
        FieldOp::ArrayRemove(values) => {
            if let Some(entry) = current.get_mut(&key) {
                let Value::Array(items) = entry else {
                    return Err(invalid(path, "array remove on non-array field"));
                };
                items.retain(|item| !values.contains(item));
            }
        }
    }

    Ok(())
}

fn invalid(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidField {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
