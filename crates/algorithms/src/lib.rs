//! # GeoTally Algorithms
//!
//! Aggregation algorithms over GeoJSON feature collections.
//!
//! ## Available Algorithm Categories
//!
//! - **vector**: property flattening, value frequencies, field combinations,
//!   geometry union with bounding box and centroid
//! - **statistics**: numeric field summaries (mean, median, standard deviation)

mod maybe_rayon;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::statistics::{numeric_statistics, NumericStatistics};
    pub use crate::vector::{
        aggregate_features, aggregate_features_parallel, analyze_geojson, flatten_properties,
        normalize, AggregationParams, AggregationResult, BoundingBox, FeatureAggregation,
    };
    pub use geotally_core::prelude::*;
}
