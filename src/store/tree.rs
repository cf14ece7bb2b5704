//! JSON tree operations backing the in-memory store.
//!
//! The tree never stores `null` or empty objects: writing either deletes the
//! location, and parents left empty by a delete are pruned.

use serde_json::{Map, Value};

/// Look up the value at `segments`.
pub fn get<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if is_absent(node) { None } else { Some(node) }
}

/// Replace the value at `segments`. A `null` (or empty) value deletes.
pub fn set(root: &mut Value, segments: &[String], value: Value) {
    let value = normalize(value);
    let Some((last, parents)) = segments.split_last() else {
        *root = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    match value {
        Some(value) => {
            let mut node = root;
            for segment in parents {
                node = ensure_object(node)
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            ensure_object(node).insert(last.clone(), value);
        }
        None => remove(root, segments),
    }
}

/// Sorted child keys of the object at `segments`.
pub fn child_keys(root: &Value, segments: &[String]) -> Vec<String> {
    match get(root, segments) {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn remove(root: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = root else {
        return;
    };
    if rest.is_empty() {
        map.remove(first);
        return;
    }
    let Some(child) = map.get_mut(first) else {
        return;
    };
    remove(child, rest);
    if is_absent(child) {
        map.remove(first);
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Strip nulls and empty objects recursively; `None` means "nothing left".
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() { None } else { Some(Value::Object(cleaned)) }
        }
        other => Some(other),
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
