//! Common test fixtures for mangrove analysis tests.
//!
//! Geometries are in WGS84 degrees near the equator so that areas and
//! lengths stay easy to reason about.

use std::path::PathBuf;

use geo::{LineString, MultiPolygon, Polygon};
use serde_json::json;
use tempfile::TempDir;

/// Axis-aligned square `size` degrees wide with its south-west corner at
/// `(min_lon, min_lat)`.
pub fn square_aoi(min_lon: f64, min_lat: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![square(min_lon, min_lat, size)])
}

/// Square AOI with a centred square hole; `margin` is the ring width.
pub fn square_with_hole(min_lon: f64, min_lat: f64, size: f64, margin: f64) -> MultiPolygon<f64> {
    let hole = square(min_lon + margin, min_lat + margin, size - 2.0 * margin);
    let outer = square(min_lon, min_lat, size);
    MultiPolygon::new(vec![Polygon::new(
        outer.exterior().clone(),
        vec![hole.exterior().clone()],
    )])
}

/// Two disjoint unit squares at lon 0..1 and lon 2..3, lat 0..1.
pub fn two_squares() -> MultiPolygon<f64> {
    MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(2.0, 0.0, 1.0)])
}

fn square(min_lon: f64, min_lat: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (min_lon, min_lat),
            (min_lon + size, min_lat),
            (min_lon + size, min_lat + size),
            (min_lon, min_lat + size),
            (min_lon, min_lat),
        ]),
        vec![],
    )
}

/// Ring coordinates of a square, closed, for building GeoJSON.
pub fn square_ring(min_lon: f64, min_lat: f64, size: f64) -> Vec<[f64; 2]> {
    vec![
        [min_lon, min_lat],
        [min_lon + size, min_lat],
        [min_lon + size, min_lat + size],
        [min_lon, min_lat + size],
        [min_lon, min_lat],
    ]
}

/// GeoJSON FeatureCollection of analysis AOIs.
///
/// * `1_2_22` - unit square at lon 0..1, lat 0..1
/// * `1_2_13` - unit square at lon 2..3, lat 0..1
/// * `holed` - unit square at lon 0..1 with a 0.5° hole
pub fn aoi_feature_collection() -> String {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": "1_2_22"},
                "geometry": {"type": "Polygon", "coordinates": [square_ring(0.0, 0.0, 1.0)]}
            },
            {
                "type": "Feature",
                "properties": {"id": "1_2_13"},
                "geometry": {"type": "Polygon", "coordinates": [square_ring(2.0, 0.0, 1.0)]}
            },
            {
                "type": "Feature",
                "properties": {"id": "holed"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [square_ring(0.0, 0.0, 1.0), square_ring(0.25, 0.25, 0.5)]
                }
            }
        ]
    })
    .to_string()
}

/// GeoJSON FeatureCollection with one coastline running west to east along
/// lat 0.5 from lon -1 to lon 4.
pub fn coastline_feature_collection() -> String {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": "coast-1"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-1.0, 0.5], [4.0, 0.5]]
                }
            }
        ]
    })
    .to_string()
}

/// Create a temporary directory containing the given files.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_dir_with(files: &[(&str, &str)]) -> std::io::Result<(TempDir, Vec<PathBuf>)> {
    let dir = tempfile::tempdir()?;
    let mut paths = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.path().join(name);
        std::fs::write(&path, contents)?;
        paths.push(path);
    }
    Ok((dir, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn test_square_with_hole_area() {
        let aoi = square_with_hole(0.0, 0.0, 1.0, 0.25);
        assert!((aoi.unsigned_area() - 0.75).abs() < 1e-12);
        assert_eq!(aoi.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_feature_collection_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(&aoi_feature_collection()).unwrap();
        assert_eq!(value["features"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_temp_dir_with_writes_files() {
        let (_dir, paths) = temp_dir_with(&[("a.json", "{}")]).unwrap();
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "{}");
    }
}
