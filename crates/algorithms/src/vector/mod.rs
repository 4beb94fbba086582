//! Vector feature analysis
//!
//! Aggregation of a feature collection into summary tables:
//! - Flatten: nested properties to dotted field paths
//! - Normalize: property values to hashable keys
//! - Frequency: per-field and per-combination value counts
//! - Spatial: geometry validation, union, bounding box and centroid
//! - Aggregate: the single-pass driver tying them together

mod aggregate;
mod flatten;
mod frequency;
mod normalize;
mod spatial;

pub use aggregate::{
    aggregate_features, aggregate_features_parallel, analyze_geojson, AggregationParams,
    AggregationResult, FeatureAccumulator, FeatureAggregation,
};
pub use flatten::{flatten_properties, FlatProperties, PATH_SEPARATOR};
pub use frequency::{
    CombinationCounts, CombinationKey, ExcludeFilter, FrequencyAggregator, ValueCounts,
};
pub use normalize::normalize;
pub use spatial::{bounding_box, BoundingBox, SpatialSummary, SpatialUnifier, UnionGeometry};
