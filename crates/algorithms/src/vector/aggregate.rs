//! Feature collection aggregation
//!
//! One forward pass over a feature collection that feeds the field flattener,
//! the frequency tables, the numeric summarizer and the spatial unifier, then
//! freezes everything into an `AggregationResult`.

use geo_types::Point;
use geotally_core::io::read_geojson;
use geotally_core::{
    Algorithm, Error, Feature, FeatureCollection, NormalizedValue, ParallelAlgorithm, Result,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

use super::flatten::flatten_properties;
use super::frequency::{
    CombinationCounts, CombinationKey, ExcludeFilter, FrequencyAggregator, ValueCounts,
};
use super::spatial::{BoundingBox, SpatialUnifier};
use crate::maybe_rayon::*;
use crate::statistics::{NumericStatistics, NumericSummarizer};

/// Parameters for feature aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// Field-path prefixes left out of value counting and numeric statistics
    pub exclude: Vec<String>,
    /// Fields counted jointly; their order defines the combination key
    pub combination: Vec<String>,
    /// Features per shard for the parallel driver
    pub shard_size: usize,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            combination: Vec::new(),
            shard_size: 4096,
        }
    }
}

impl AggregationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse comma-separated exclude and combination lists (`"id, extra.name"`).
    pub fn from_lists(exclude: &str, combination: &str) -> Self {
        Self {
            exclude: split_list(exclude),
            combination: split_list(combination),
            ..Self::default()
        }
    }

    /// Set the excluded field prefixes.
    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.exclude = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the combination fields.
    pub fn combination(mut self, fields: &[&str]) -> Self {
        self.combination = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn shard_size(mut self, size: usize) -> Self {
        self.shard_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_size == 0 {
            return Err(Error::InvalidParameter {
                name: "shard_size",
                value: self.shard_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(empty) = self.combination.iter().position(|f| f.trim().is_empty()) {
            return Err(Error::InvalidParameter {
                name: "combination",
                value: format!("{:?}", self.combination),
                reason: format!("field {} is empty", empty),
            });
        }
        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Terminal snapshot of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub feature_count: usize,
    /// Valid geometries per GeoJSON type name
    pub geometry_counts: BTreeMap<String, usize>,
    /// Every flattened field seen, excluded ones included, sorted
    pub field_names: Vec<String>,
    /// Value counts per non-excluded field, in discovery order
    pub field_value_counts: IndexMap<String, ValueCounts>,
    pub combination_fields: Vec<String>,
    pub combination_counts: CombinationCounts,
    /// One entry per non-excluded field; statistics are absent for fields
    /// without numeric values
    pub numeric_statistics: IndexMap<String, NumericStatistics>,
    pub bounding_box: Option<BoundingBox>,
    pub centroid: Option<Point<f64>>,
    /// Feature geometries dropped as unparsable or invalid
    pub skipped_geometries: usize,
}

impl AggregationResult {
    /// Value counts of `field` by descending count, then ascending string form
    pub fn sorted_value_counts(&self, field: &str) -> Option<Vec<(&NormalizedValue, usize)>> {
        self.field_value_counts.get(field).map(ValueCounts::sorted)
    }

    /// Combination counts by descending count, then ascending key
    pub fn sorted_combinations(&self) -> Vec<(&CombinationKey, usize)> {
        self.combination_counts.sorted()
    }
}

/// Mutable state of one aggregation pass (or one shard of it)
#[derive(Debug, Clone)]
pub struct FeatureAccumulator {
    feature_count: usize,
    field_names: BTreeSet<String>,
    frequencies: FrequencyAggregator,
    numeric: NumericSummarizer,
    spatial: SpatialUnifier,
    combination: Vec<String>,
}

impl FeatureAccumulator {
    pub fn new(params: &AggregationParams) -> Self {
        Self {
            feature_count: 0,
            field_names: BTreeSet::new(),
            frequencies: FrequencyAggregator::new(ExcludeFilter::new(&params.exclude)),
            numeric: NumericSummarizer::new(),
            spatial: SpatialUnifier::new(),
            combination: params.combination.iter().map(|f| f.trim().to_string()).collect(),
        }
    }

    /// Process one feature. `index` is its position in the input, for logs.
    pub fn add_feature(&mut self, index: usize, feature: &Feature) {
        self.feature_count += 1;

        if let Some(payload) = feature.geometry_payload() {
            if let Err(e) = self.spatial.add(payload) {
                warn!(feature = index, error = %e, "skipping feature geometry");
            }
        }

        let flat = flatten_properties(&feature.properties);
        for (field, value) in &flat {
            if !self.field_names.contains(field.as_str()) {
                self.field_names.insert(field.clone());
            }
            if self.frequencies.record_field_value(field, value) {
                self.numeric.observe(field, value);
            }
        }

        if !self.combination.is_empty() {
            self.frequencies.record_combination(&self.combination, &flat);
        }
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Fold in the accumulator of the shard that follows this one
    pub fn merge(mut self, other: FeatureAccumulator) -> FeatureAccumulator {
        self.feature_count += other.feature_count;
        self.field_names.extend(other.field_names);
        self.frequencies.merge(other.frequencies);
        self.numeric.merge(other.numeric);
        self.spatial = self.spatial.merge(other.spatial);
        self
    }

    pub fn finish(self) -> AggregationResult {
        let spatial = self.spatial.finish();
        let (field_value_counts, combination_counts) = self.frequencies.into_parts();
        let result = AggregationResult {
            feature_count: self.feature_count,
            geometry_counts: spatial.geometry_counts,
            field_names: self.field_names.into_iter().collect(),
            field_value_counts,
            combination_fields: self.combination,
            combination_counts,
            numeric_statistics: self.numeric.finish(),
            bounding_box: spatial.bounding_box,
            centroid: spatial.centroid,
            skipped_geometries: spatial.skipped,
        };
        debug!(
            features = result.feature_count,
            fields = result.field_names.len(),
            skipped_geometries = result.skipped_geometries,
            "aggregation finished"
        );
        result
    }
}

/// Aggregate a feature collection in a single sequential pass.
///
/// Only invalid parameters fail; bad geometries and union failures are
/// recovered and reflected in the result.
pub fn aggregate_features(
    collection: &FeatureCollection,
    params: &AggregationParams,
) -> Result<AggregationResult> {
    params.validate()?;
    let mut acc = FeatureAccumulator::new(params);
    for (index, feature) in collection.iter().enumerate() {
        acc.add_feature(index, feature);
    }
    Ok(acc.finish())
}

/// Aggregate a feature collection shard by shard.
///
/// Each shard of `params.shard_size` features gets its own accumulator; the
/// accumulators are merged in input order, so the result matches
/// `aggregate_features` up to floating-point noise in the centroid.
pub fn aggregate_features_parallel(
    collection: &FeatureCollection,
    params: &AggregationParams,
) -> Result<AggregationResult> {
    params.validate()?;
    let shard_size = params.shard_size;
    let shards: Vec<&[Feature]> = collection.as_slice().chunks(shard_size).collect();

    let accumulators: Vec<FeatureAccumulator> = shards
        .into_par_iter()
        .enumerate()
        .map(|(shard, features)| {
            let mut acc = FeatureAccumulator::new(params);
            for (offset, feature) in features.iter().enumerate() {
                acc.add_feature(shard * shard_size + offset, feature);
            }
            acc
        })
        .collect();

    let merged = accumulators
        .into_iter()
        .fold(FeatureAccumulator::new(params), FeatureAccumulator::merge);
    Ok(merged.finish())
}

/// Read a GeoJSON file and aggregate it.
///
/// Read errors are fatal and surface before any aggregation happens.
pub fn analyze_geojson<P: AsRef<Path>>(
    path: P,
    params: &AggregationParams,
) -> Result<AggregationResult> {
    params.validate()?;
    let collection = read_geojson(path)?;
    aggregate_features(&collection, params)
}

/// Feature aggregation algorithm
#[derive(Debug, Clone, Default)]
pub struct FeatureAggregation;

impl Algorithm for FeatureAggregation {
    type Input = FeatureCollection;
    type Output = AggregationResult;
    type Params = AggregationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Feature Aggregation"
    }

    fn description(&self) -> &'static str {
        "Count geometry types, property values and field combinations; summarize numbers and extent"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aggregate_features(&input, &params)
    }
}

impl ParallelAlgorithm for FeatureAggregation {
    fn execute_parallel(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aggregate_features_parallel(&input, &params)
    }
}
