//! AOI geometry helpers: hole handling, clipping vector layers to an AOI
//! and geodesic lengths.
//!
//! Ring 0 of every polygon is the exterior. `geo` stores the exterior ring
//! separately from the interiors, and GeoJSON (RFC 7946) requires the first
//! ring to be the exterior, so no winding-order check is needed.

use geo::{
    BooleanOps, Contains, Geometry, HaversineLength, LineString, MultiLineString, MultiPolygon,
    Polygon, Relate, Simplify,
};
use mangrove_common::BoundingBox;
use tracing::debug;

use crate::types::METERS_PER_DEGREE;

/// Whether each polygon of the AOI has interior rings.
pub fn check_has_holes(aoi: &MultiPolygon<f64>) -> Vec<bool> {
    aoi.0.iter().map(|p| !p.interiors().is_empty()).collect()
}

/// The AOI with every interior ring dropped.
pub fn remove_holes(aoi: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        aoi.0
            .iter()
            .map(|p| Polygon::new(p.exterior().clone(), vec![]))
            .collect(),
    )
}

/// Metres to degrees at the equator.
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Clip a vector layer to the AOI.
///
/// Features whose bounding box misses the AOI are discarded. The rest are
/// simplified to `tolerance_m`, then split into those the AOI fully contains,
/// which are kept as they are, and those crossing its boundary, which are
/// intersected with the AOI. Both groups are returned together.
///
/// # Arguments
/// * `features` - Vector layer geometries in WGS84 degrees
/// * `aoi` - Area of interest
/// * `tolerance_m` - Simplification tolerance in metres
pub fn intersect_and_simplify(
    features: &[Geometry<f64>],
    aoi: &MultiPolygon<f64>,
    tolerance_m: f64,
) -> Vec<Geometry<f64>> {
    let Some(aoi_bounds) = BoundingBox::of(&Geometry::MultiPolygon(aoi.clone())) else {
        return Vec::new();
    };
    let epsilon = meters_to_degrees(tolerance_m);

    let candidates: Vec<Geometry<f64>> = features
        .iter()
        .filter(|f| BoundingBox::of(f).is_some_and(|b| b.intersects(&aoi_bounds)))
        .map(|f| simplify(f, epsilon))
        .collect();

    let (inside, crossing): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|f| contained_in(aoi, f));

    debug!(
        features = features.len(),
        inside = inside.len(),
        crossing = crossing.len(),
        tolerance_m,
        "Clipping vector layer to AOI"
    );

    let clipped = crossing.iter().filter_map(|f| intersect(aoi, f));
    inside.into_iter().chain(clipped).collect()
}

fn simplify(feature: &Geometry<f64>, epsilon: f64) -> Geometry<f64> {
    match feature {
        Geometry::LineString(l) => l.simplify(&epsilon).into(),
        Geometry::MultiLineString(l) => l.simplify(&epsilon).into(),
        Geometry::Polygon(p) => p.simplify(&epsilon).into(),
        Geometry::MultiPolygon(p) => p.simplify(&epsilon).into(),
        other => other.clone(),
    }
}

fn contained_in(aoi: &MultiPolygon<f64>, feature: &Geometry<f64>) -> bool {
    match feature {
        Geometry::Point(p) => aoi.contains(p),
        Geometry::LineString(l) => aoi.relate(l).is_contains(),
        Geometry::MultiLineString(l) => aoi.relate(l).is_contains(),
        Geometry::Polygon(p) => aoi.relate(p).is_contains(),
        Geometry::MultiPolygon(p) => aoi.relate(p).is_contains(),
        _ => false,
    }
}

fn intersect(aoi: &MultiPolygon<f64>, feature: &Geometry<f64>) -> Option<Geometry<f64>> {
    let clipped: Geometry<f64> = match feature {
        Geometry::LineString(l) => aoi.clip(&MultiLineString::new(vec![l.clone()]), false).into(),
        Geometry::MultiLineString(l) => aoi.clip(l, false).into(),
        Geometry::Polygon(p) => aoi.intersection(&MultiPolygon::new(vec![p.clone()])).into(),
        Geometry::MultiPolygon(p) => aoi.intersection(p).into(),
        _ => return None,
    };

    let empty = match &clipped {
        Geometry::MultiLineString(l) => l.0.iter().all(|ls| ls.0.len() < 2),
        Geometry::MultiPolygon(p) => p.0.is_empty(),
        _ => false,
    };
    (!empty).then_some(clipped)
}

/// All line work of a layer: line strings plus polygon rings.
pub fn line_work(features: &[Geometry<f64>]) -> MultiLineString<f64> {
    let mut lines: Vec<LineString<f64>> = Vec::new();
    for feature in features {
        collect_lines(feature, &mut lines);
    }
    MultiLineString::new(lines)
}

fn collect_lines(feature: &Geometry<f64>, out: &mut Vec<LineString<f64>>) {
    match feature {
        Geometry::LineString(l) => out.push(l.clone()),
        Geometry::MultiLineString(l) => out.extend(l.0.iter().cloned()),
        Geometry::Polygon(p) => {
            out.push(p.exterior().clone());
            out.extend(p.interiors().iter().cloned());
        }
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                collect_lines(&Geometry::Polygon(p.clone()), out);
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                collect_lines(g, out);
            }
        }
        _ => {}
    }
}

/// Haversine length in metres of a layer's line work.
pub fn geodesic_length(features: &[Geometry<f64>]) -> f64 {
    line_work(features).haversine_length()
}
