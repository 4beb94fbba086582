//! Property value types
//!
//! `PropertyValue` is the tagged form of a GeoJSON property leaf or subtree.
//! `NormalizedValue` is its canonical, hashable and totally ordered form used
//! as a frequency-table key.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered mapping of property keys to values, in document order.
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// A property value as found in a feature's `properties` object
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl PropertyValue {
    /// True for integer and floating-point values only.
    ///
    /// Booleans and numeric-looking strings are not numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, PropertyValue::Int(_) | PropertyValue::Float(_))
    }

    /// Numeric value as `f64`, `None` for anything that is not a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                // u64 above i64::MAX, or a real float
                None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropertyValue::String(s),
            Value::Array(items) => {
                PropertyValue::List(items.into_iter().map(PropertyValue::from).collect())
            }
            Value::Object(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(PropertyValue::from)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

/// Canonical hashable form of a `PropertyValue`.
///
/// Lists keep element order; maps are stored as key-sorted pairs, so two maps
/// with the same entries compare equal whatever their insertion order.
#[derive(Debug, Clone)]
pub enum NormalizedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<NormalizedValue>),
    Map(Vec<(String, NormalizedValue)>),
}

/// Bit pattern used for float equality and hashing: `-0.0` folds into `0.0`
/// and every NaN into one canonical NaN.
fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn canonical_cmp(a: f64, b: f64) -> Ordering {
    f64::from_bits(canonical_bits(a)).total_cmp(&f64::from_bits(canonical_bits(b)))
}

impl NormalizedValue {
    fn rank(&self) -> u8 {
        match self {
            NormalizedValue::Null => 0,
            NormalizedValue::Bool(_) => 1,
            NormalizedValue::Int(_) | NormalizedValue::Float(_) => 2,
            NormalizedValue::String(_) => 3,
            NormalizedValue::List(_) => 4,
            NormalizedValue::Map(_) => 5,
        }
    }
}

impl PartialEq for NormalizedValue {
    fn eq(&self, other: &Self) -> bool {
        use NormalizedValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => canonical_bits(*a) == canonical_bits(*b),
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for NormalizedValue {}

impl Hash for NormalizedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            NormalizedValue::Null => {}
            NormalizedValue::Bool(b) => b.hash(state),
            NormalizedValue::Int(i) => i.hash(state),
            NormalizedValue::Float(f) => canonical_bits(*f).hash(state),
            NormalizedValue::String(s) => s.hash(state),
            NormalizedValue::List(items) => items.hash(state),
            NormalizedValue::Map(pairs) => pairs.hash(state),
        }
    }
}

impl Ord for NormalizedValue {
    /// Total order: null < bool < number < string < list < map.
    ///
    /// Integers and floats compare numerically; when numerically equal the
    /// integer sorts first so the order stays consistent with `Eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        use NormalizedValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => canonical_cmp(*a, *b),
            (Int(a), Float(b)) => canonical_cmp(*a as f64, *b).then(Ordering::Less),
            (Float(a), Int(b)) => canonical_cmp(*a, *b as f64).then(Ordering::Greater),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for NormalizedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Null => write!(f, "null"),
            NormalizedValue::Bool(b) => write!(f, "{}", b),
            NormalizedValue::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part, so 1.0 never reads as the integer 1
            NormalizedValue::Float(x) => write!(f, "{:?}", x),
            NormalizedValue::String(s) => write!(f, "{}", s),
            NormalizedValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            NormalizedValue::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: ", k)?;
                    v.fmt_nested(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl NormalizedValue {
    /// Strings are quoted inside containers to keep `["a, b"]` apart from `["a", "b"]`.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Null => serializer.serialize_unit(),
            NormalizedValue::Bool(b) => serializer.serialize_bool(*b),
            NormalizedValue::Int(i) => serializer.serialize_i64(*i),
            NormalizedValue::Float(x) => serializer.serialize_f64(*x),
            NormalizedValue::String(s) => serializer.serialize_str(s),
            NormalizedValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            NormalizedValue::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
