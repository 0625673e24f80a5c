//! Identifier filter normalization.
//!
//! Callers filter by the generic `id` key; the content store names the field `_id`. Every
//! provider runs its query through [`normalize_id_filter`] before reaching the backend.

use serde_json::{Map as JsonMap, Value};

pub const GENERIC_ID_FIELD: &str = "id";
pub const BACKEND_ID_FIELD: &str = "_id";

/// Rewrite `{ id: x }` into `{ _id: x }`, removing the generic key.
///
/// An explicit `_id` already present wins over `id`. Applying the function twice yields the same
/// map as applying it once.
pub fn normalize_id_filter(query: &JsonMap<String, Value>) -> JsonMap<String, Value> {
    let mut normalized = query.clone();
    if let Some(id) = normalized.remove(GENERIC_ID_FIELD)
        && !normalized.contains_key(BACKEND_ID_FIELD)
    {
        normalized.insert(BACKEND_ID_FIELD.to_string(), id);
    }
    normalized
}

/// Identifiers requested by a normalized query: a single string or an array of strings.
pub fn id_filter_values(query: &JsonMap<String, Value>) -> Option<Vec<String>> {
    match query.get(BACKEND_ID_FIELD)? {
        Value::String(id) => Some(vec![id.clone()]),
        Value::Array(ids) => ids.iter().map(|id| id.as_str().map(str::to_string)).collect(),
        _ => None,
    }
}
