//! Value normalization
//!
//! Turns any property value into a `NormalizedValue` usable as a hash key.

use geotally_core::{NormalizedValue, PropertyValue};

/// Normalize a property value.
///
/// Scalars pass through, lists keep their order, maps become key-sorted pairs.
/// Total: every `PropertyValue` has a normalized form.
pub fn normalize(value: &PropertyValue) -> NormalizedValue {
    match value {
        PropertyValue::Null => NormalizedValue::Null,
        PropertyValue::Bool(b) => NormalizedValue::Bool(*b),
        PropertyValue::Int(i) => NormalizedValue::Int(*i),
        PropertyValue::Float(f) => NormalizedValue::Float(*f),
        PropertyValue::String(s) => NormalizedValue::String(s.clone()),
        PropertyValue::List(items) => NormalizedValue::List(items.iter().map(normalize).collect()),
        PropertyValue::Map(map) => {
            let mut pairs: Vec<(String, NormalizedValue)> =
                map.iter().map(|(k, v)| (k.clone(), normalize(v))).collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            NormalizedValue::Map(pairs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(v: &NormalizedValue) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(normalize(&PropertyValue::Null), NormalizedValue::Null);
        assert_eq!(normalize(&PropertyValue::Int(4)), NormalizedValue::Int(4));
        assert_eq!(normalize(&PropertyValue::from("a")), NormalizedValue::String("a".into()));
        assert_eq!(normalize(&PropertyValue::Bool(true)), NormalizedValue::Bool(true));
    }

    #[test]
    fn test_map_key_order_is_irrelevant() {
        let a = normalize(&PropertyValue::from(json!({"a": 1, "b": 2})));
        let b = normalize(&PropertyValue::from(json!({"b": 2, "a": 1})));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_list_order_is_significant() {
        let a = normalize(&PropertyValue::from(json!([1, 2])));
        let b = normalize(&PropertyValue::from(json!([2, 1])));
        assert_ne!(a, b);
    }

    #[test]
    fn test_nested_structures() {
        let a = normalize(&PropertyValue::from(json!([{"y": [1, {"q": 1, "p": 2}], "x": null}])));
        let b = normalize(&PropertyValue::from(json!([{"x": null, "y": [1, {"p": 2, "q": 1}]}])));
        assert_eq!(a, b);
        match a {
            NormalizedValue::List(items) => match &items[0] {
                NormalizedValue::Map(pairs) => {
                    assert_eq!(pairs[0].0, "x");
                    assert_eq!(pairs[1].0, "y");
                }
                other => panic!("expected map, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }
}
