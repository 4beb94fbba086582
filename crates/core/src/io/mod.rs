//! I/O operations for reading geospatial data

mod geojson;

pub use geojson::{read_geojson, read_geojson_from_buffer, read_geojson_from_str};
