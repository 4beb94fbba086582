//! GeoJSON geometry payloads
//!
//! Features keep their geometry as the raw GeoJSON object. Parsing into
//! `geo_types` happens per feature, so a malformed shape only affects the
//! feature that carries it.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// A GeoJSON position. Values past the second (elevation, measure) are ignored.
type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryPayload {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeometryPayload> },
}

/// The `type` member of a geometry payload, if it is a string
pub fn geometry_type(payload: &Value) -> Option<&str> {
    payload.get("type").and_then(Value::as_str)
}

/// True when a payload means "no geometry": `null` or an empty object.
pub fn is_absent(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Parse a GeoJSON geometry object into a `geo_types` geometry.
///
/// Rejects unknown types, positions with fewer than two ordinates, line strings
/// with a single position and rings with fewer than four positions once closed.
/// Does not check topological validity.
pub fn parse_geometry(payload: &Value) -> Result<Geometry<f64>> {
    let kind = geometry_type(payload).unwrap_or("unknown").to_string();
    let parsed = GeometryPayload::deserialize(payload).map_err(|e| Error::GeometryParse {
        kind: kind.clone(),
        reason: e.to_string(),
    })?;
    build(parsed).map_err(|reason| Error::GeometryParse { kind, reason })
}

fn build(payload: GeometryPayload) -> std::result::Result<Geometry<f64>, String> {
    Ok(match payload {
        GeometryPayload::Point { coordinates } => {
            Geometry::Point(Point::from(coord(&coordinates)?))
        }
        GeometryPayload::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
            coordinates
                .iter()
                .map(|p| coord(p).map(Point::from))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeometryPayload::LineString { coordinates } => {
            Geometry::LineString(line_string(&coordinates)?)
        }
        GeometryPayload::MultiLineString { coordinates } => {
            Geometry::MultiLineString(MultiLineString::new(
                coordinates
                    .iter()
                    .map(|ls| line_string(ls))
                    .collect::<std::result::Result<_, _>>()?,
            ))
        }
        GeometryPayload::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
        GeometryPayload::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
            coordinates
                .iter()
                .map(|rings| polygon(rings))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeometryPayload::GeometryCollection { geometries } => {
            Geometry::GeometryCollection(GeometryCollection::new_from(
                geometries
                    .into_iter()
                    .map(build)
                    .collect::<std::result::Result<_, _>>()?,
            ))
        }
    })
}

fn coord(position: &[f64]) -> std::result::Result<Coord<f64>, String> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(format!(
            "position needs at least 2 ordinates, got {}",
            position.len()
        )),
    }
}

fn coords(positions: &[Position]) -> std::result::Result<Vec<Coord<f64>>, String> {
    positions.iter().map(|p| coord(p)).collect()
}

fn line_string(positions: &[Position]) -> std::result::Result<LineString<f64>, String> {
    if positions.len() == 1 {
        return Err("line string needs at least 2 positions".into());
    }
    Ok(LineString::new(coords(positions)?))
}

fn ring(positions: &[Position]) -> std::result::Result<LineString<f64>, String> {
    let mut ring = coords(positions)?;
    if ring.is_empty() {
        return Ok(LineString::new(ring));
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    if ring.len() < 4 {
        return Err(format!(
            "linear ring needs at least 4 positions, got {}",
            ring.len()
        ));
    }
    Ok(LineString::new(ring))
}

fn polygon(rings: &[Vec<Position>]) -> std::result::Result<Polygon<f64>, String> {
    let mut rings = rings.iter().map(|r| ring(r));
    let exterior = match rings.next() {
        Some(r) => r?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}
