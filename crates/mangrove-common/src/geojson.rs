//! GeoJSON types for AOI features and vector layers.
//!
//! Only the geometry types the analyses consume are modelled. Each type
//! converts into the matching `geo` geometry so the engine never touches
//! raw coordinate arrays.

use geo::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AtlasError, AtlasResult};

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    /// Array of features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a new empty FeatureCollection.
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    /// Add a feature to the collection.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Parse a collection from a JSON string.
    pub fn from_json(json: &str) -> AtlasResult<Self> {
        let fc: FeatureCollection = serde_json::from_str(json)?;
        if fc.type_ != "FeatureCollection" {
            return Err(AtlasError::InvalidGeometry(format!(
                "expected FeatureCollection, found '{}'",
                fc.type_
            )));
        }
        Ok(fc)
    }

    /// Find a feature by its identifier.
    pub fn find(&self, fid: &str) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.identifier().as_deref() == Some(fid))
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// Optional top-level identifier (string or number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// The geometry of this feature; `null` is allowed by RFC 7946.
    pub geometry: Option<GeoJsonGeometry>,

    /// Free-form properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Create a feature around a geometry.
    pub fn new(geometry: GeoJsonGeometry) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry: Some(geometry),
            properties: Map::new(),
        }
    }

    /// Set the `id` property.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.properties
            .insert("id".to_string(), Value::String(id.into()));
        self
    }

    /// Identifier of the feature.
    ///
    /// The `id` property wins over the top-level `id` member. Numeric ids are
    /// rendered without a fractional part when they are integral.
    pub fn identifier(&self) -> Option<String> {
        self.properties
            .get("id")
            .or(self.id.as_ref())
            .and_then(value_to_id)
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// GeoJSON geometry types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    /// A point geometry.
    Point { coordinates: [f64; 2] },

    /// A line string geometry.
    LineString { coordinates: Vec<[f64; 2]> },

    /// A set of line strings.
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },

    /// A polygon geometry.
    /// Array of linear rings (first is exterior, rest are holes).
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },

    /// A set of polygons.
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl GeoJsonGeometry {
    /// Create a polygon geometry.
    pub fn polygon(coordinates: Vec<Vec<[f64; 2]>>) -> Self {
        GeoJsonGeometry::Polygon { coordinates }
    }

    /// Create a line string geometry.
    pub fn line_string(coordinates: Vec<[f64; 2]>) -> Self {
        GeoJsonGeometry::LineString { coordinates }
    }

    /// Convert into a `geo` geometry.
    pub fn to_geo(&self) -> AtlasResult<geo::Geometry<f64>> {
        Ok(match self {
            GeoJsonGeometry::Point { coordinates } => {
                Point::new(coordinates[0], coordinates[1]).into()
            }
            GeoJsonGeometry::LineString { coordinates } => to_line_string(coordinates).into(),
            GeoJsonGeometry::MultiLineString { coordinates } => {
                MultiLineString::new(coordinates.iter().map(|l| to_line_string(l)).collect())
                    .into()
            }
            GeoJsonGeometry::Polygon { coordinates } => to_polygon(coordinates)?.into(),
            GeoJsonGeometry::MultiPolygon { coordinates } => MultiPolygon::new(
                coordinates
                    .iter()
                    .map(|p| to_polygon(p))
                    .collect::<AtlasResult<Vec<_>>>()?,
            )
            .into(),
        })
    }

    /// Convert a Polygon or MultiPolygon into a multipolygon.
    pub fn to_multi_polygon(&self) -> AtlasResult<MultiPolygon<f64>> {
        match self.to_geo()? {
            geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
            geo::Geometry::MultiPolygon(mp) => Ok(mp),
            _ => Err(AtlasError::InvalidGeometry(format!(
                "expected Polygon or MultiPolygon, found {}",
                self.type_name()
            ))),
        }
    }

    /// GeoJSON type name of the geometry.
    pub fn type_name(&self) -> &'static str {
        match self {
            GeoJsonGeometry::Point { .. } => "Point",
            GeoJsonGeometry::LineString { .. } => "LineString",
            GeoJsonGeometry::MultiLineString { .. } => "MultiLineString",
            GeoJsonGeometry::Polygon { .. } => "Polygon",
            GeoJsonGeometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

fn to_line_string(coords: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(coords.iter().map(|c| Coord { x: c[0], y: c[1] }).collect())
}

fn to_polygon(rings: &[Vec<[f64; 2]>]) -> AtlasResult<Polygon<f64>> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| AtlasError::InvalidGeometry("polygon without rings".to_string()))?;
    Ok(Polygon::new(
        to_line_string(exterior),
        interiors.iter().map(|r| to_line_string(r)).collect(),
    ))
}
