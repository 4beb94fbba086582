//! Property flattening
//!
//! Nested property maps become a single-level map keyed by dotted paths
//! (`extra.category`). Lists are leaves and are not descended into.

use geotally_core::{PropertyMap, PropertyValue};
use indexmap::IndexMap;

/// Flattened properties: dotted path → borrowed leaf value, in discovery order
pub type FlatProperties<'a> = IndexMap<String, &'a PropertyValue>;

/// Path separator between nesting levels
pub const PATH_SEPARATOR: char = '.';

/// Flatten a nested property map into dotted paths.
///
/// Keys are visited in map order, depth first. An empty nested map yields no
/// entries. If a literal dotted key collides with a nested path, the value
/// seen last wins and the first position is kept.
pub fn flatten_properties(properties: &PropertyMap) -> FlatProperties<'_> {
    let mut out = IndexMap::with_capacity(properties.len());
    flatten_into(properties, "", &mut out);
    out
}

fn flatten_into<'a>(map: &'a PropertyMap, parent: &str, out: &mut FlatProperties<'a>) {
    for (key, value) in map {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, PATH_SEPARATOR, key)
        };
        match value {
            PropertyValue::Map(nested) => flatten_into(nested, &path, out),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> PropertyMap {
        match PropertyValue::from(value) {
            PropertyValue::Map(m) => m,
            other => panic!("expected object, got {:?}", other),
        }
    }

    fn count_leaves(map: &PropertyMap) -> usize {
        map.values()
            .map(|v| match v {
                PropertyValue::Map(m) => count_leaves(m),
                _ => 1,
            })
            .sum()
    }

    #[test]
    fn test_flat_input_unchanged() {
        let p = props(json!({"id": 1, "name": "x", "tags": [1, 2]}));
        let flat = flatten_properties(&p);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "tags"]);
        assert_eq!(flat["tags"], &p["tags"]);
    }

    #[test]
    fn test_nested_paths() {
        let p = props(json!({
            "code": 1,
            "extra": {"category": "room", "type": "A", "deep": {"level": 3}},
            "style": null
        }));
        let flat = flatten_properties(&p);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["code", "extra.category", "extra.type", "extra.deep.level", "style"]
        );
        assert_eq!(flat["extra.deep.level"], &PropertyValue::Int(3));
        assert!(flat["style"].is_null());
    }

    #[test]
    fn test_entry_count_matches_leaf_count() {
        let p = props(json!({
            "a": {"b": {"c": 1, "d": [1, {"x": 1}]}, "e": "s"},
            "f": true,
            "g": {}
        }));
        assert_eq!(flatten_properties(&p).len(), count_leaves(&p));
        assert_eq!(count_leaves(&p), 4);
    }

    #[test]
    fn test_empty() {
        assert!(flatten_properties(&PropertyMap::new()).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let p = props(json!({"z": {"y": 1, "x": 2}, "a": 3}));
        let first: Vec<String> = flatten_properties(&p).keys().cloned().collect();
        let second: Vec<String> = flatten_properties(&p).keys().cloned().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["z.y", "z.x", "a"]);
    }

    #[test]
    fn test_collision_last_value_wins() {
        let p = props(json!({"a.b": 1, "a": {"b": 2}}));
        let flat = flatten_properties(&p);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["a.b"], &PropertyValue::Int(2));
    }
}
