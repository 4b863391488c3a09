//! Tests for GeoJSON parsing and conversion into AOI geometries.

use geo::Area;
use mangrove_common::{AtlasError, Feature, FeatureCollection, GeoJsonGeometry};

const AOIS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"id": "1_2_22", "name": "Square"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
            }
        },
        {
            "type": "Feature",
            "id": 7,
            "properties": {},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]],
                    [[[2, 0], [3, 0], [3, 1], [2, 1], [2, 0]]]
                ]
            }
        },
        {
            "type": "Feature",
            "properties": {"id": "empty"},
            "geometry": null
        }
    ]
}"#;

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_parse_feature_collection() {
    let fc = FeatureCollection::from_json(AOIS).unwrap();
    assert_eq!(fc.features.len(), 3);
    assert!(fc.features[2].geometry.is_none());
}

#[test]
fn test_reject_other_document_types() {
    let err = FeatureCollection::from_json(r#"{"type": "Feature", "features": []}"#).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidGeometry(_)));
}

#[test]
fn test_reject_malformed_json() {
    assert!(FeatureCollection::from_json("{not json").is_err());
}

// ============================================================================
// Identifier tests
// ============================================================================

#[test]
fn test_find_by_property_id() {
    let fc = FeatureCollection::from_json(AOIS).unwrap();
    assert!(fc.find("1_2_22").is_some());
    assert!(fc.find("1_2_23").is_none());
}

#[test]
fn test_numeric_top_level_id() {
    let fc = FeatureCollection::from_json(AOIS).unwrap();
    let feature = fc.find("7").unwrap();
    assert_eq!(feature.identifier().as_deref(), Some("7"));
}

#[test]
fn test_builder_sets_id_property() {
    let fc = FeatureCollection::new().with_feature(
        Feature::new(GeoJsonGeometry::line_string(vec![[0.0, 0.0], [1.0, 1.0]])).with_id("coast-1"),
    );
    assert!(fc.find("coast-1").is_some());
}

// ============================================================================
// Conversion tests
// ============================================================================

#[test]
fn test_polygon_to_multi_polygon() {
    let fc = FeatureCollection::from_json(AOIS).unwrap();
    let aoi = fc.find("1_2_22").unwrap().geometry.as_ref().unwrap().to_multi_polygon().unwrap();
    assert_eq!(aoi.0.len(), 1);
    assert!((aoi.unsigned_area() - 1.0).abs() < 1e-12);
}

#[test]
fn test_multi_polygon_keeps_parts() {
    let fc = FeatureCollection::from_json(AOIS).unwrap();
    let aoi = fc.find("7").unwrap().geometry.as_ref().unwrap().to_multi_polygon().unwrap();
    assert_eq!(aoi.0.len(), 2);
    assert!((aoi.unsigned_area() - 2.0).abs() < 1e-12);
}

#[test]
fn test_line_is_not_an_aoi() {
    let line = GeoJsonGeometry::line_string(vec![[0.0, 0.0], [1.0, 0.0]]);
    assert!(line.to_multi_polygon().is_err());
    assert!(matches!(line.to_geo().unwrap(), geo::Geometry::LineString(_)));
}
