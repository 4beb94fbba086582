//! Error types for GeoTally

use thiserror::Error;

/// Main error type for GeoTally operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Cannot parse {kind} geometry: {reason}")]
    GeometryParse { kind: String, reason: String },

    #[error("Invalid {kind} geometry: {reason}")]
    GeometryInvalid { kind: String, reason: String },

    #[error("Spatial union failed: {0}")]
    SpatialUnion(String),

    #[error("Value normalization failed for field '{field}': {reason}")]
    ValueNormalization { field: String, reason: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    /// Whether the error aborts a whole run.
    ///
    /// Geometry and union failures are recovered per feature; everything else
    /// stops the run before a result is produced.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::GeometryParse { .. } | Error::GeometryInvalid { .. } | Error::SpatialUnion(_)
        )
    }
}

/// Result type alias for GeoTally operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        let parse = Error::GeometryParse {
            kind: "Point".into(),
            reason: "missing coordinates".into(),
        };
        assert!(!parse.is_fatal());
        assert!(!Error::SpatialUnion("overlay".into()).is_fatal());
        assert!(Error::InvalidGeoJson("root is not an object".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let e = Error::GeometryInvalid {
            kind: "Polygon".into(),
            reason: "self-intersection".into(),
        };
        assert_eq!(e.to_string(), "Invalid Polygon geometry: self-intersection");
    }
}
