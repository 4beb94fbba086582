//! GeoJSON FeatureCollection reading
//!
//! Only the collection envelope and the feature members are validated here.
//! Geometry payloads stay raw so a bad shape cannot fail the whole read.

use crate::error::{Error, Result};
use crate::vector::{Feature, FeatureCollection};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON FeatureCollection from a file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let file = File::open(path.as_ref())?;
    let collection = decode_geojson(BufReader::new(file))?;
    debug!(
        path = %path.as_ref().display(),
        features = collection.len(),
        "read GeoJSON"
    );
    Ok(collection)
}

/// Read a GeoJSON FeatureCollection from an in-memory buffer
pub fn read_geojson_from_buffer(data: &[u8]) -> Result<FeatureCollection> {
    decode_geojson(data)
}

/// Read a GeoJSON FeatureCollection from a string
pub fn read_geojson_from_str(s: &str) -> Result<FeatureCollection> {
    decode_geojson(s.as_bytes())
}

/// Internal: decode from any reader.
///
/// The root must be an object. A missing `features` member reads as an empty
/// collection; a `features` member that is not an array is an error.
fn decode_geojson<R: Read>(reader: R) -> Result<FeatureCollection> {
    let root: Value = serde_json::from_reader(reader)?;
    let mut root = match root {
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidGeoJson(format!(
                "root must be an object, got {}",
                json_kind(&other)
            )))
        }
    };

    let features = match root.remove("features") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value::<Feature>(item)
                    .map_err(|e| Error::InvalidGeoJson(format!("feature {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(Error::InvalidGeoJson(format!(
                "'features' must be an array, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(FeatureCollection::from(features))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
