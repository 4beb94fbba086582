//! Spatial union of feature geometries: bounding box and centroid
//!
//! Valid geometries are folded one by one into a `UnionGeometry`. Polygonal
//! parts are dissolved with a boolean union, overlapping lines are merged and
//! duplicate points collapse. The extent and centroid are read from the union
//! once all features are in.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BooleanOps, BoundingRect, Centroid as GeoCentroid, Validation};
use geo_types::{
    Coord, Geometry, GeometryCollection, Line, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use geotally_core::vector::{geometry_type, parse_geometry};
use geotally_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Compute the bounding box of a geometry
pub fn bounding_box(geom: &Geometry<f64>) -> Option<BoundingBox> {
    geom.bounding_rect().map(|rect| BoundingBox {
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

/// Cumulative union of accumulated geometries.
///
/// Folding consumes the current union and returns the next one. Lineal parts
/// are kept as non-overlapping segments, split where they cross.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionGeometry {
    polygons: MultiPolygon<f64>,
    segments: Vec<Line<f64>>,
    points: MultiPoint<f64>,
    seen_points: HashSet<(u64, u64)>,
}

impl Default for UnionGeometry {
    fn default() -> Self {
        Self {
            polygons: MultiPolygon::new(vec![]),
            segments: Vec::new(),
            points: MultiPoint::new(vec![]),
            seen_points: HashSet::new(),
        }
    }
}

impl UnionGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty() && self.segments.is_empty() && self.points.0.is_empty()
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    /// Dissolved lineal part
    pub fn lines(&self) -> MultiLineString<f64> {
        MultiLineString::new(self.segments.iter().map(|l| LineString::from(*l)).collect())
    }

    /// Fold one geometry into the union
    pub fn union(self, geom: &Geometry<f64>) -> Result<UnionGeometry> {
        let mut parts = UnionGeometry::new();
        parts.absorb(geom);
        self.merge(parts)
    }

    /// Union of two partial unions
    pub fn merge(mut self, other: UnionGeometry) -> Result<UnionGeometry> {
        self.polygons = dissolve(&self.polygons, &other.polygons)?;
        for seg in other.segments {
            self.push_segment(seg);
        }
        for p in other.points.0 {
            self.push_point(p);
        }
        Ok(self)
    }

    /// All parts as one collection, polygons first
    pub fn to_geometry(&self) -> Geometry<f64> {
        let mut parts = Vec::with_capacity(3);
        if !self.polygons.0.is_empty() {
            parts.push(Geometry::MultiPolygon(self.polygons.clone()));
        }
        if !self.segments.is_empty() {
            parts.push(Geometry::MultiLineString(self.lines()));
        }
        if !self.points.0.is_empty() {
            parts.push(Geometry::MultiPoint(self.points.clone()));
        }
        Geometry::GeometryCollection(GeometryCollection::new_from(parts))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        bounding_box(&self.to_geometry())
    }

    /// Centroid of the highest-dimension part (areas over lines over points)
    pub fn centroid(&self) -> Option<Point<f64>> {
        if !self.polygons.0.is_empty() {
            self.polygons.centroid()
        } else if !self.segments.is_empty() {
            self.lines().centroid()
        } else {
            self.points.centroid()
        }
    }

    fn push_point(&mut self, p: Point<f64>) {
        let key = (normalize_zero(p.x()).to_bits(), normalize_zero(p.y()).to_bits());
        if self.seen_points.insert(key) {
            self.points.0.push(p);
        }
    }

    /// Add a segment, keeping only the stretches not already covered.
    ///
    /// Stored segments never overlap; a crossing splits both segments at the
    /// crossing point.
    fn push_segment(&mut self, seg: Line<f64>) {
        if seg.start == seg.end {
            return;
        }
        let mut pieces = vec![(0.0, 1.0)];
        let mut cuts = Vec::new();
        let existing = std::mem::take(&mut self.segments);
        self.segments.reserve(existing.len() + 1);
        for other in existing {
            match line_intersection(seg, other) {
                Some(LineIntersection::Collinear { intersection }) => {
                    let a = segment_param(&seg, intersection.start);
                    let b = segment_param(&seg, intersection.end);
                    pieces = subtract_interval(pieces, a.min(b), a.max(b));
                    self.segments.push(other);
                }
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    cuts.push(segment_param(&seg, intersection));
                    let t = segment_param(&other, intersection);
                    if t > PARAM_EPS && t < 1.0 - PARAM_EPS {
                        self.segments.push(Line::new(other.start, intersection));
                        self.segments.push(Line::new(intersection, other.end));
                    } else {
                        self.segments.push(other);
                    }
                }
                None => self.segments.push(other),
            }
        }

        cuts.sort_by(f64::total_cmp);
        for (a, b) in pieces {
            let mut from = a;
            for &t in cuts.iter().filter(|&&t| t > a + PARAM_EPS && t < b - PARAM_EPS) {
                self.segments.push(Line::new(segment_at(&seg, from), segment_at(&seg, t)));
                from = t;
            }
            self.segments.push(Line::new(segment_at(&seg, from), segment_at(&seg, b)));
        }
    }

    /// Split a geometry into its parts (only lines are dissolved here)
    fn absorb(&mut self, geom: &Geometry<f64>) {
        match geom {
            Geometry::Point(p) => self.push_point(*p),
            Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| self.push_point(*p)),
            Geometry::Line(l) => self.push_segment(*l),
            Geometry::LineString(ls) => ls.lines().for_each(|l| self.push_segment(l)),
            Geometry::MultiLineString(mls) => {
                mls.0.iter().flat_map(|ls| ls.lines()).for_each(|l| self.push_segment(l))
            }
            Geometry::Polygon(p) => self.push_polygon(p.clone()),
            Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| self.push_polygon(p.clone())),
            Geometry::Rect(r) => self.push_polygon(r.to_polygon()),
            Geometry::Triangle(t) => self.push_polygon(t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| self.absorb(g)),
        }
    }

    fn push_polygon(&mut self, p: Polygon<f64>) {
        if !p.exterior().0.is_empty() {
            self.polygons.0.push(p);
        }
    }
}

/// Pieces shorter than this fraction of their segment are dropped
const PARAM_EPS: f64 = 1e-12;

/// Position of `c` along `seg`, 0 at the start and 1 at the end
fn segment_param(seg: &Line<f64>, c: Coord<f64>) -> f64 {
    let d = seg.delta();
    ((c.x - seg.start.x) * d.x + (c.y - seg.start.y) * d.y) / (d.x * d.x + d.y * d.y)
}

fn segment_at(seg: &Line<f64>, t: f64) -> Coord<f64> {
    if t <= 0.0 {
        seg.start
    } else if t >= 1.0 {
        seg.end
    } else {
        seg.start + seg.delta() * t
    }
}

fn subtract_interval(pieces: Vec<(f64, f64)>, lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(pieces.len() + 1);
    for (a, b) in pieces {
        if hi <= a || lo >= b {
            out.push((a, b));
            continue;
        }
        if lo - a > PARAM_EPS {
            out.push((a, lo));
        }
        if b - hi > PARAM_EPS {
            out.push((hi, b));
        }
    }
    out
}

fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Boolean union of two multipolygons.
///
/// Overlay panics on some degenerate inputs; that is reported as a union error.
fn dissolve(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
    if b.0.is_empty() {
        return Ok(a.clone());
    }
    let result = catch_unwind(AssertUnwindSafe(|| {
        if a.0.is_empty() {
            // Dissolve overlaps inside b itself
            b.union(&MultiPolygon::new(vec![]))
        } else {
            a.union(b)
        }
    }))
    .map_err(|payload| Error::SpatialUnion(panic_message(payload.as_ref())))?;

    let finite = result
        .0
        .iter()
        .flat_map(|p| p.exterior().0.iter().chain(p.interiors().iter().flat_map(|r| r.0.iter())))
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Err(Error::SpatialUnion("union produced non-finite coordinates".into()));
    }
    Ok(result)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "boolean overlay panicked".to_string()
    }
}

#[derive(Debug, Clone)]
enum UnionState {
    Active(UnionGeometry),
    Failed(String),
}

/// Extent summary produced by `SpatialUnifier::finish`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialSummary {
    /// Valid geometries per GeoJSON type name
    pub geometry_counts: BTreeMap<String, usize>,
    /// Geometries skipped because they failed to parse or validate
    pub skipped: usize,
    pub bounding_box: Option<BoundingBox>,
    pub centroid: Option<Point<f64>>,
}

/// Validates feature geometries, counts them by type and folds them into a union
#[derive(Debug, Clone)]
pub struct SpatialUnifier {
    geometry_counts: BTreeMap<String, usize>,
    skipped: usize,
    state: UnionState,
}

impl Default for SpatialUnifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialUnifier {
    pub fn new() -> Self {
        Self {
            geometry_counts: BTreeMap::new(),
            skipped: 0,
            state: UnionState::Active(UnionGeometry::new()),
        }
    }

    /// Add one feature's geometry payload.
    ///
    /// A payload that cannot be parsed or is not valid returns the
    /// corresponding error and leaves the counts and union untouched apart
    /// from the skip counter. A union failure is not returned: it disables the
    /// extent for the rest of the run.
    pub fn add(&mut self, payload: &Value) -> Result<()> {
        let geom = match parse_geometry(payload) {
            Ok(g) => g,
            Err(e) => {
                self.skipped += 1;
                return Err(e);
            }
        };
        let kind = geometry_type(payload).unwrap_or("unknown");
        if !geom.is_valid() {
            self.skipped += 1;
            return Err(Error::GeometryInvalid {
                kind: kind.to_string(),
                reason: "geometry fails validity checks".to_string(),
            });
        }

        *self.geometry_counts.entry(kind.to_string()).or_insert(0) += 1;

        let state = std::mem::replace(&mut self.state, UnionState::Failed(String::new()));
        self.state = match state {
            UnionState::Active(union) => match union.union(&geom) {
                Ok(next) => UnionState::Active(next),
                Err(e) => {
                    warn!(error = %e, "spatial union failed; extent will be unavailable");
                    UnionState::Failed(e.to_string())
                }
            },
            failed => failed,
        };
        Ok(())
    }

    pub fn geometry_counts(&self) -> &BTreeMap<String, usize> {
        &self.geometry_counts
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Current union, `None` once a union step has failed
    pub fn union(&self) -> Option<&UnionGeometry> {
        match &self.state {
            UnionState::Active(u) => Some(u),
            UnionState::Failed(_) => None,
        }
    }

    /// Combine with a unifier that processed a later shard
    pub fn merge(mut self, other: SpatialUnifier) -> SpatialUnifier {
        for (kind, count) in other.geometry_counts {
            *self.geometry_counts.entry(kind).or_insert(0) += count;
        }
        self.skipped += other.skipped;
        self.state = match (self.state, other.state) {
            (UnionState::Active(a), UnionState::Active(b)) => match a.merge(b) {
                Ok(u) => UnionState::Active(u),
                Err(e) => {
                    warn!(error = %e, "spatial union failed while merging shards");
                    UnionState::Failed(e.to_string())
                }
            },
            (UnionState::Failed(reason), _) | (_, UnionState::Failed(reason)) => {
                UnionState::Failed(reason)
            }
        };
        self
    }

    /// Reduce the union to its extent and centroid
    pub fn finish(self) -> SpatialSummary {
        let (bounding_box, centroid) = match &self.state {
            UnionState::Active(union) if !union.is_empty() => {
                (union.bounding_box(), union.centroid())
            }
            _ => (None, None),
        };
        SpatialSummary {
            geometry_counts: self.geometry_counts,
            skipped: self.skipped,
            bounding_box,
            centroid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(x0: f64, y0: f64, size: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]
            ]]
        })
    }

    #[test]
    fn test_bounding_box() {
        let bb = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bb.width(), 10.0);
        assert_eq!(bb.height(), 5.0);
        assert!(bb.contains_point(5.0, 5.0));
        assert!(!bb.contains_point(15.0, 5.0));
        assert_eq!(bb.as_tuple(), (0.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn test_point_and_polygon() {
        let mut unifier = SpatialUnifier::new();
        unifier.add(&json!({"type": "Point", "coordinates": [20.0, 20.0]})).unwrap();
        unifier.add(&square(0.0, 0.0, 10.0)).unwrap();

        let summary = unifier.finish();
        assert_eq!(summary.geometry_counts.get("Point"), Some(&1));
        assert_eq!(summary.geometry_counts.get("Polygon"), Some(&1));
        assert_eq!(
            summary.bounding_box,
            Some(BoundingBox::new(0.0, 0.0, 20.0, 20.0))
        );
        // The polygon dominates the centroid
        let c = summary.centroid.unwrap();
        assert!((c.x() - 5.0).abs() < 1e-9);
        assert!((c.y() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_polygons_are_dissolved() {
        let mut unifier = SpatialUnifier::new();
        unifier.add(&square(0.0, 0.0, 10.0)).unwrap();
        unifier.add(&square(0.0, 0.0, 10.0)).unwrap();
        unifier.add(&square(10.0, 0.0, 10.0)).unwrap();

        let union = unifier.union().unwrap();
        let area: f64 = geo::Area::unsigned_area(union.polygons());
        assert!((area - 200.0).abs() < 1e-6);

        let summary = unifier.finish();
        assert_eq!(summary.geometry_counts.get("Polygon"), Some(&3));
        let c = summary.centroid.unwrap();
        assert!((c.x() - 10.0).abs() < 1e-9);
        assert!((c.y() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_geometry_is_skipped() {
        let mut unifier = SpatialUnifier::new();
        let err = unifier
            .add(&json!({"type": "Polygon", "coordinates": [[[0.0, 0.0]]]}))
            .unwrap_err();
        assert!(matches!(err, Error::GeometryParse { .. }));
        assert_eq!(unifier.skipped(), 1);
        assert!(unifier.geometry_counts().is_empty());

        let summary = unifier.finish();
        assert!(summary.bounding_box.is_none());
        assert!(summary.centroid.is_none());
    }

    #[test]
    fn test_self_intersecting_polygon_is_invalid() {
        let mut unifier = SpatialUnifier::new();
        let bowtie = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0], [0.0, 0.0]]]
        });
        let err = unifier.add(&bowtie).unwrap_err();
        assert!(matches!(err, Error::GeometryInvalid { ref kind, .. } if kind == "Polygon"));
        assert!(unifier.geometry_counts().is_empty());
    }

    #[test]
    fn test_points_only() {
        let mut unifier = SpatialUnifier::new();
        for (x, y) in [(0.0, 0.0), (4.0, 0.0), (4.0, 0.0), (2.0, 6.0)] {
            unifier.add(&json!({"type": "Point", "coordinates": [x, y]})).unwrap();
        }
        let summary = unifier.finish();
        assert_eq!(summary.geometry_counts.get("Point"), Some(&4));
        assert_eq!(summary.bounding_box, Some(BoundingBox::new(0.0, 0.0, 4.0, 6.0)));
        // Duplicate (4, 0) collapses: mean of three distinct points
        let c = summary.centroid.unwrap();
        assert!((c.x() - 2.0).abs() < 1e-9);
        assert!((c.y() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_lines() {
        let mut unifier = SpatialUnifier::new();
        unifier
            .add(&json!({"type": "LineString", "coordinates": [[0.0, 0.0], [10.0, 0.0]]}))
            .unwrap();
        unifier.add(&json!({"type": "Point", "coordinates": [100.0, 100.0]})).unwrap();
        let summary = unifier.finish();
        assert_eq!(summary.bounding_box, Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)));
        let c = summary.centroid.unwrap();
        assert!((c.x() - 5.0).abs() < 1e-9);
        assert!(c.y().abs() < 1e-9);
    }

    fn line(coords: &[(f64, f64)]) -> Value {
        let coords: Vec<[f64; 2]> = coords.iter().map(|&(x, y)| [x, y]).collect();
        json!({"type": "LineString", "coordinates": coords})
    }

    fn total_length(lines: &MultiLineString<f64>) -> f64 {
        lines.0.iter().flat_map(|ls| ls.lines()).map(|l| l.dx().hypot(l.dy())).sum()
    }

    #[test]
    fn test_overlapping_lines_are_merged() {
        let mut unifier = SpatialUnifier::new();
        unifier.add(&line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        unifier.add(&line(&[(5.0, 0.0), (20.0, 0.0)])).unwrap();

        let length = total_length(&unifier.union().unwrap().lines());
        assert!((length - 20.0).abs() < 1e-9);
        let c = unifier.finish().centroid.unwrap();
        assert!((c.x() - 10.0).abs() < 1e-9);
        assert!(c.y().abs() < 1e-9);
    }

    #[test]
    fn test_contained_line_adds_nothing() {
        let mut unifier = SpatialUnifier::new();
        unifier.add(&line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        unifier.add(&line(&[(0.0, 0.0), (2.0, 0.0)])).unwrap();
        unifier.add(&line(&[(10.0, 0.0), (0.0, 0.0)])).unwrap();

        assert_eq!(unifier.union().unwrap().lines().0.len(), 1);
        let summary = unifier.finish();
        assert_eq!(summary.geometry_counts.get("LineString"), Some(&3));
        let c = summary.centroid.unwrap();
        assert!((c.x() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossing_lines_are_split() {
        let mut unifier = SpatialUnifier::new();
        unifier.add(&line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        unifier.add(&line(&[(5.0, -5.0), (5.0, 5.0)])).unwrap();

        let lines = unifier.union().unwrap().lines();
        assert_eq!(lines.0.len(), 4);
        assert!((total_length(&lines) - 20.0).abs() < 1e-9);
        let c = unifier.finish().centroid.unwrap();
        assert!((c.x() - 5.0).abs() < 1e-9);
        assert!(c.y().abs() < 1e-9);
    }

    #[test]
    fn test_failed_union_drops_extent_but_keeps_counts() {
        let mut unifier = SpatialUnifier {
            state: UnionState::Failed("overlay error".into()),
            ..SpatialUnifier::new()
        };
        unifier.add(&square(0.0, 0.0, 10.0)).unwrap();
        unifier.add(&json!({"type": "Point", "coordinates": [1.0, 1.0]})).unwrap();
        assert!(unifier.union().is_none());

        let summary = unifier.finish();
        assert_eq!(summary.geometry_counts.get("Polygon"), Some(&1));
        assert_eq!(summary.geometry_counts.get("Point"), Some(&1));
        assert!(summary.bounding_box.is_none());
        assert!(summary.centroid.is_none());
    }

    #[test]
    fn test_merge_with_failed_shard() {
        let mut active = SpatialUnifier::new();
        active.add(&square(0.0, 0.0, 10.0)).unwrap();
        let mut failed = SpatialUnifier {
            state: UnionState::Failed("overlay error".into()),
            ..SpatialUnifier::new()
        };
        failed.add(&square(20.0, 0.0, 10.0)).unwrap();

        for merged in [active.clone().merge(failed.clone()), failed.merge(active)] {
            assert!(merged.union().is_none());
            let summary = merged.finish();
            assert_eq!(summary.geometry_counts.get("Polygon"), Some(&2));
            assert!(summary.bounding_box.is_none());
            assert!(summary.centroid.is_none());
        }
    }

    #[test]
    fn test_empty_unifier() {
        let summary = SpatialUnifier::new().finish();
        assert!(summary.geometry_counts.is_empty());
        assert!(summary.bounding_box.is_none());
        assert!(summary.centroid.is_none());
    }

    #[test]
    fn test_union_is_replaced_not_mutated() {
        let first = UnionGeometry::new()
            .union(&Geometry::Point(Point::new(1.0, 1.0)))
            .unwrap();
        let snapshot = first.clone();
        let second = first.union(&Geometry::Point(Point::new(2.0, 2.0))).unwrap();
        assert_ne!(snapshot, second);
        assert_eq!(snapshot.bounding_box(), Some(BoundingBox::new(1.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_merge_shards() {
        let mut a = SpatialUnifier::new();
        a.add(&square(0.0, 0.0, 10.0)).unwrap();
        let mut b = SpatialUnifier::new();
        b.add(&square(5.0, 5.0, 10.0)).unwrap();
        b.add(&json!({"type": "Point"})).unwrap_err();

        let merged = a.merge(b);
        assert_eq!(merged.skipped(), 1);
        let summary = merged.finish();
        assert_eq!(summary.geometry_counts.get("Polygon"), Some(&2));
        assert_eq!(summary.bounding_box, Some(BoundingBox::new(0.0, 0.0, 15.0, 15.0)));
    }
}
