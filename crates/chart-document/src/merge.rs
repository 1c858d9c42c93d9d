//! Document merge logic
//!
//! Right-biased deep merge:
//! - Mappings: deep-merge by key
//! - Sequences: REPLACE (source wins)
//! - Scalars: override (source wins)
//! - Shape mismatch: source replaces destination wholesale

use serde_yaml::{Mapping, Value};

/// Key holding the chart dependency list in `Chart.yaml`.
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Deep merge `source` into `destination` in place.
///
/// Only a mapping merged into a mapping recurses. Every other combination
/// (scalar vs mapping, sequence vs sequence, mapping vs scalar) replaces the
/// destination value with the source value, discarding what was there.
pub fn deep_merge(destination: &mut Value, source: Value) {
    match (destination, source) {
        (Value::Mapping(dest_map), Value::Mapping(source_map)) => {
            merge_mappings(dest_map, source_map);
        }
        (dest, source) => *dest = source,
    }
}

/// Deep merge two mappings, key by key.
pub fn merge_mappings(destination: &mut Mapping, source: Mapping) {
    for (key, source_value) in source {
        let recurse = matches!(
            (destination.get(&key), &source_value),
            (Some(Value::Mapping(_)), Value::Mapping(_))
        );

        if recurse {
            if let Some(existing) = destination.get_mut(&key) {
                deep_merge(existing, source_value);
            }
        } else {
            // Replacing an existing key keeps its position in the mapping.
            destination.insert(key, source_value);
        }
    }
}

/// Identity of a chart dependency entry: its `alias`, falling back to `name`.
pub fn dependency_identity(entry: &Value) -> Option<&str> {
    let map = entry.as_mapping()?;
    map.get("alias")
        .and_then(Value::as_str)
        .or_else(|| map.get("name").and_then(Value::as_str))
}

/// Append `incoming` dependency entries after the existing ones.
///
/// Unlike [`deep_merge`], the dependency list is concatenated rather than
/// replaced. An incoming entry whose identity is already listed is not
/// appended a second time. An entry without an identity is skipped when an
/// equal entry is already listed.
/// If the destination has no sequence under `dependencies`, the incoming
/// list becomes the dependency list.
///
/// Returns the number of entries appended.
pub fn append_dependencies(destination: &mut Mapping, incoming: Vec<Value>) -> usize {
    match destination.get_mut(DEPENDENCIES_KEY) {
        Some(Value::Sequence(existing)) => {
            let mut appended = 0;
            for entry in incoming {
                let already_listed = match dependency_identity(&entry) {
                    Some(id) => existing
                        .iter()
                        .any(|e| dependency_identity(e) == Some(id)),
                    None => existing.contains(&entry),
                };
                if !already_listed {
                    existing.push(entry);
                    appended += 1;
                }
            }
            appended
        }
        _ => {
            let count = incoming.len();
            destination.insert(
                Value::String(DEPENDENCIES_KEY.to_string()),
                Value::Sequence(incoming),
            );
            count
        }
    }
}
