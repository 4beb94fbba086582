//! Vector data structures
//!
//! - `Feature`: raw geometry payload + nested properties
//! - `FeatureCollection`: ordered collection of features
//! - `PropertyValue` / `NormalizedValue`: property leaves and their hashable form

mod geometry;
mod value;

pub use geometry::{geometry_type, is_absent, parse_geometry};
pub use value::{NormalizedValue, PropertyMap, PropertyValue};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Raw GeoJSON geometry object, parsed lazily by consumers
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Feature attributes; a `null` properties member reads as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: PropertyMap,
    /// Optional feature ID (string or number in GeoJSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PropertyMap, D::Error> {
    Option::<PropertyMap>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Feature {
    /// Create a new feature with a GeoJSON geometry payload
    pub fn new(geometry: Value) -> Self {
        Self {
            geometry: Some(geometry),
            properties: PropertyMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace all attributes
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get a top-level attribute
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Geometry payload unless it is missing, `null` or `{}`
    pub fn geometry_payload(&self) -> Option<&Value> {
        self.geometry.as_ref().filter(|g| !is_absent(g))
    }
}

/// Collection of features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_from_json() {
        let f: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "id": 7,
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
            "properties": {"name": "a", "extra": {"level": 2}}
        }))
        .unwrap();
        assert_eq!(f.id, Some(json!(7)));
        assert!(f.geometry_payload().is_some());
        assert_eq!(f.get_property("name"), Some(&PropertyValue::from("a")));
        assert!(f.get_property("extra").unwrap().as_map().is_some());
    }

    #[test]
    fn test_null_members() {
        let f: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": null,
            "properties": null
        }))
        .unwrap();
        assert!(f.geometry.is_none());
        assert!(f.properties.is_empty());
    }

    #[test]
    fn test_empty_geometry_object_is_absent() {
        let f = Feature::new(json!({}));
        assert!(f.geometry_payload().is_none());
    }

    #[test]
    fn test_set_property() {
        let mut f = Feature::empty();
        f.set_property("code", 3i64);
        f.set_property("kind", "room");
        assert_eq!(f.get_property("code"), Some(&PropertyValue::Int(3)));
        assert_eq!(f.properties.len(), 2);
    }

    #[test]
    fn test_collection() {
        let mut fc = FeatureCollection::new();
        assert!(fc.is_empty());
        fc.push(Feature::empty());
        fc.push(Feature::new(json!({"type": "Point", "coordinates": [0.0, 0.0]})));
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.iter().filter(|f| f.geometry.is_some()).count(), 1);
    }
}
