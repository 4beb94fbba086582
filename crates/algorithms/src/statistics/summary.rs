//! Numeric field summaries
//!
//! Collects integer and floating-point property values per field and reduces
//! them to mean, median and population standard deviation.

use geotally_core::PropertyValue;
use indexmap::IndexMap;
use serde::Serialize;

/// Summary statistics of one numeric field.
///
/// All three statistics are `None` when the field had no numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NumericStatistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
}

impl NumericStatistics {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Compute mean, median and population standard deviation
pub fn numeric_statistics(values: &[f64]) -> NumericStatistics {
    let count = values.len();
    if count == 0 {
        return NumericStatistics::default();
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };

    NumericStatistics {
        count,
        mean: Some(mean),
        median: Some(median),
        std: Some(var.sqrt()),
    }
}

/// Per-field numeric value collector
#[derive(Debug, Clone, Default)]
pub struct NumericSummarizer {
    values: IndexMap<String, Vec<f64>>,
}

impl NumericSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` and keep `value` if it is an integer or float.
    ///
    /// Fields seen only with non-numeric values still get an (empty) entry.
    pub fn observe(&mut self, field: &str, value: &PropertyValue) {
        if !self.values.contains_key(field) {
            self.values.insert(field.to_string(), Vec::new());
        }
        if let (Some(v), Some(list)) = (value.as_f64(), self.values.get_mut(field)) {
            list.push(v);
        }
    }

    pub fn values(&self, field: &str) -> Option<&[f64]> {
        self.values.get(field).map(Vec::as_slice)
    }

    /// Append another summarizer's values after this one's
    pub fn merge(&mut self, other: NumericSummarizer) {
        for (field, values) in other.values {
            self.values.entry(field).or_default().extend(values);
        }
    }

    pub fn finish(self) -> IndexMap<String, NumericStatistics> {
        self.values
            .into_iter()
            .map(|(field, values)| {
                let stats = numeric_statistics(&values);
                (field, stats)
            })
            .collect()
    }
}
