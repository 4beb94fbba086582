//! Value frequency tables
//!
//! Counts normalized property values per flattened field and, optionally,
//! joint occurrences of several fields.

use geotally_core::{NormalizedValue, PropertyValue};
use indexmap::IndexMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::flatten::{FlatProperties, PATH_SEPARATOR};
use super::normalize::normalize;

/// Field-path prefixes removed from value counting.
///
/// A pattern matches a field equal to it or nested under it: `extra` matches
/// `extra` and `extra.category` but not `extras`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExcludeFilter {
    patterns: Vec<String>,
}

impl ExcludeFilter {
    /// Build a filter. Patterns are trimmed and empty ones dropped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            field
                .strip_prefix(pattern.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Key used when sorting value counts: `null` sorts as the empty string.
///
/// Other values use a repr-style text form (`True`, `1e+20`, `('a', 1)`):
/// containers read as tuples and maps as tuples of key/value pairs.
fn sort_key(value: &NormalizedValue) -> String {
    let mut out = String::new();
    match value {
        NormalizedValue::Null => {}
        NormalizedValue::String(s) => out.push_str(s),
        other => write_repr(other, &mut out),
    }
    out
}

fn write_repr(value: &NormalizedValue, out: &mut String) {
    match value {
        NormalizedValue::Null => out.push_str("None"),
        NormalizedValue::Bool(true) => out.push_str("True"),
        NormalizedValue::Bool(false) => out.push_str("False"),
        NormalizedValue::Int(i) => out.push_str(&i.to_string()),
        NormalizedValue::Float(x) => out.push_str(&repr_float(*x)),
        NormalizedValue::String(s) => out.push_str(&repr_quoted(s)),
        NormalizedValue::List(items) => {
            write_repr_tuple(items.iter(), items.len(), out, |item, out| {
                write_repr(item, out)
            })
        }
        NormalizedValue::Map(pairs) => {
            write_repr_tuple(pairs.iter(), pairs.len(), out, |(k, v), out| {
                out.push('(');
                out.push_str(&repr_quoted(k));
                out.push_str(", ");
                write_repr(v, out);
                out.push(')');
            })
        }
    }
}

fn write_repr_tuple<T>(
    items: impl Iterator<Item = T>,
    len: usize,
    out: &mut String,
    mut write_item: impl FnMut(T, &mut String),
) {
    out.push('(');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_item(item, out);
    }
    if len == 1 {
        out.push(',');
    }
    out.push(')');
}

/// `repr` of a float: same digits as `{:?}`, exponent signed and two digits wide
fn repr_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = format!("{:?}", x);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn repr_quoted(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Occurrence counts of the normalized values of one field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCounts {
    counts: HashMap<NormalizedValue, usize>,
}

impl ValueCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, value: NormalizedValue) {
        *self.counts.entry(value).or_insert(0) += 1;
    }

    pub fn get(&self, value: &NormalizedValue) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedValue, usize)> {
        self.counts.iter().map(|(v, c)| (v, *c))
    }

    /// Values ordered by descending count, then ascending string form.
    ///
    /// Values with the same count and string form (`1` and `"1"`) fall back to
    /// the value order so the result is fully deterministic.
    pub fn sorted(&self) -> Vec<(&NormalizedValue, usize)> {
        let mut entries: Vec<(&NormalizedValue, usize, String)> = self
            .counts
            .iter()
            .map(|(v, c)| (v, *c, sort_key(v)))
            .collect();
        entries.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.0.cmp(b.0))
        });
        entries.into_iter().map(|(v, c, _)| (v, c)).collect()
    }

    pub fn merge(&mut self, other: ValueCounts) {
        for (value, count) in other.counts {
            *self.counts.entry(value).or_insert(0) += count;
        }
    }
}

#[derive(Serialize)]
struct ValueCountEntry<'a> {
    value: &'a NormalizedValue,
    count: usize,
}

impl Serialize for ValueCounts {
    /// Serialized as a list of `{value, count}` in sorted order
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sorted = self.sorted();
        let mut seq = serializer.serialize_seq(Some(sorted.len()))?;
        for (value, count) in sorted {
            seq.serialize_element(&ValueCountEntry { value, count })?;
        }
        seq.end()
    }
}

/// One value per combination field; `None` when the feature lacks the field
pub type CombinationKey = Vec<Option<NormalizedValue>>;

/// Joint occurrence counts of the configured combination fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinationCounts {
    counts: HashMap<CombinationKey, usize>,
}

impl CombinationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: CombinationKey) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn get(&self, key: &[Option<NormalizedValue>]) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Combinations ordered by descending count, then ascending key
    pub fn sorted(&self) -> Vec<(&CombinationKey, usize)> {
        let mut entries: Vec<(&CombinationKey, usize)> =
            self.counts.iter().map(|(k, c)| (k, *c)).collect();
        entries.sort_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });
        entries
    }

    pub fn merge(&mut self, other: CombinationCounts) {
        for (key, count) in other.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }
}

#[derive(Serialize)]
struct CombinationEntry<'a> {
    values: &'a CombinationKey,
    count: usize,
}

impl Serialize for CombinationCounts {
    /// Serialized as a list of `{values, count}` in sorted order; absent fields are `null`
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sorted = self.sorted();
        let mut seq = serializer.serialize_seq(Some(sorted.len()))?;
        for (values, count) in sorted {
            seq.serialize_element(&CombinationEntry { values, count })?;
        }
        seq.end()
    }
}

/// Per-field and per-combination value counter
#[derive(Debug, Clone, Default)]
pub struct FrequencyAggregator {
    exclude: ExcludeFilter,
    fields: IndexMap<String, ValueCounts>,
    combinations: CombinationCounts,
}

impl FrequencyAggregator {
    pub fn new(exclude: ExcludeFilter) -> Self {
        Self {
            exclude,
            fields: IndexMap::new(),
            combinations: CombinationCounts::new(),
        }
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.exclude.is_excluded(field)
    }

    /// Count `value` under `field`. Returns `false` if the field is excluded.
    pub fn record_field_value(&mut self, field: &str, value: &PropertyValue) -> bool {
        if self.exclude.is_excluded(field) {
            return false;
        }
        let normalized = normalize(value);
        match self.fields.get_mut(field) {
            Some(counts) => counts.increment(normalized),
            None => {
                let mut counts = ValueCounts::new();
                counts.increment(normalized);
                self.fields.insert(field.to_string(), counts);
            }
        }
        true
    }

    /// Count the joint values of `fields` in one feature's flattened properties.
    ///
    /// The exclusion filter does not apply here.
    pub fn record_combination<S: AsRef<str>>(
        &mut self,
        fields: &[S],
        properties: &FlatProperties<'_>,
    ) {
        let key: CombinationKey = fields
            .iter()
            .map(|f| properties.get(f.as_ref()).map(|v| normalize(v)))
            .collect();
        self.combinations.increment(key);
    }

    pub fn field_counts(&self) -> &IndexMap<String, ValueCounts> {
        &self.fields
    }

    pub fn combination_counts(&self) -> &CombinationCounts {
        &self.combinations
    }

    /// Fold another aggregator's counts into this one.
    ///
    /// Fields new to `self` are appended in `other`'s discovery order.
    pub fn merge(&mut self, other: FrequencyAggregator) {
        for (field, counts) in other.fields {
            match self.fields.get_mut(&field) {
                Some(existing) => existing.merge(counts),
                None => {
                    self.fields.insert(field, counts);
                }
            }
        }
        self.combinations.merge(other.combinations);
    }

    pub fn into_parts(self) -> (IndexMap<String, ValueCounts>, CombinationCounts) {
        (self.fields, self.combinations)
    }
}
