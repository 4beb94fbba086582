//! # GeoTally Core
//!
//! Core types, traits and I/O for the GeoTally feature statistics library.
//!
//! This crate provides:
//! - `Feature` / `FeatureCollection`: GeoJSON features with raw geometry payloads
//! - `PropertyValue` / `NormalizedValue`: nested attribute values and their hashable form
//! - GeoJSON geometry parsing into `geo-types`
//! - Algorithm traits for consistent API
//! - I/O for GeoJSON feature collections

pub mod error;
pub mod io;
pub mod vector;

pub use error::{Error, Result};
pub use vector::{Feature, FeatureCollection, NormalizedValue, PropertyMap, PropertyValue};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::io::{read_geojson, read_geojson_from_str};
    pub use crate::vector::{
        Feature, FeatureCollection, NormalizedValue, PropertyMap, PropertyValue,
    };
    pub use crate::{Algorithm, ParallelAlgorithm};
}

/// Core trait for all algorithms in GeoTally.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

/// Marker trait for algorithms that can be parallelized
pub trait ParallelAlgorithm: Algorithm {
    /// Execute in parallel using available cores
    fn execute_parallel(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;
}
