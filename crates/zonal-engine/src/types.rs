//! Raster model shared by the catalog and the backends.

use std::collections::HashMap;
use std::sync::Arc;

use geo::MultiPolygon;
use mangrove_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Area of interest: a (multi)polygon in WGS84 degrees.
pub type Aoi = Arc<MultiPolygon<f64>>;

/// Metres per degree of latitude, used for scale and tolerance conversions.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Spherical area in square metres of a lon/lat cell.
///
/// # Arguments
/// * `lat_south` - Southern edge in degrees
/// * `lat_north` - Northern edge in degrees
/// * `lon_span` - Cell width in degrees
pub fn cell_area_m2(lat_south: f64, lat_north: f64, lon_span: f64) -> f64 {
    EARTH_RADIUS_M
        * EARTH_RADIUS_M
        * lon_span.to_radians()
        * (lat_north.to_radians().sin() - lat_south.to_radians().sin())
}

/// Affine placement of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the upper-left corner.
    pub origin_lon: f64,
    /// Latitude of the upper-left corner.
    pub origin_lat: f64,
    /// Pixel width in degrees.
    pub pixel_width: f64,
    /// Pixel height in degrees (positive; rows run southwards).
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_lon: f64, origin_lat: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_lon,
            origin_lat,
            pixel_width,
            pixel_height,
        }
    }

    /// Column and row of the pixel containing a point, if inside the grid.
    pub fn pixel_at(&self, lon: f64, lat: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let col = ((lon - self.origin_lon) / self.pixel_width).floor();
        let row = ((self.origin_lat - lat) / self.pixel_height).floor();

        if col < 0.0 || row < 0.0 || col >= width as f64 || row >= height as f64 {
            return None;
        }

        Some((col as usize, row as usize))
    }

    /// Geographic bounds of a grid with this transform.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox::new(
            self.origin_lon,
            self.origin_lat - self.pixel_height * height as f64,
            self.origin_lon + self.pixel_width * width as f64,
            self.origin_lat,
        )
    }
}

/// One band of a raster, row-major from the top row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub data: Vec<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// A georeferenced multi-band raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// Value marking missing data. NaN is always treated as missing.
    #[serde(default)]
    pub nodata: Option<f32>,
    pub bands: Vec<Band>,
}

impl Raster {
    /// Build a raster, checking every band matches the grid size.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f32>,
        bands: Vec<Band>,
    ) -> Result<Self> {
        let raster = Self {
            width,
            height,
            transform,
            nodata,
            bands,
        };
        raster.validate()?;
        Ok(raster)
    }

    /// Single-band raster convenience constructor.
    pub fn single_band(
        name: impl Into<String>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        data: Vec<f32>,
    ) -> Result<Self> {
        Self::new(width, height, transform, None, vec![Band::new(name, data)])
    }

    /// Check the raster is well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::invalid_raster("raster has no pixels"));
        }
        if self.bands.is_empty() {
            return Err(EngineError::invalid_raster("raster has no bands"));
        }
        if !(self.transform.pixel_width > 0.0 && self.transform.pixel_height > 0.0) {
            return Err(EngineError::invalid_raster("pixel size must be positive"));
        }

        let expected = self.width * self.height;
        for band in &self.bands {
            if band.data.len() != expected {
                return Err(EngineError::invalid_raster(format!(
                    "band '{}' has {} values, expected {}x{}={}",
                    band.name,
                    band.data.len(),
                    self.width,
                    self.height,
                    expected
                )));
            }
        }

        Ok(())
    }

    /// Unmasked value of a band at a point, nearest-pixel.
    pub fn value_at(&self, band: usize, lon: f64, lat: f64) -> Option<f32> {
        let (col, row) = self.transform.pixel_at(lon, lat, self.width, self.height)?;
        let value = *self.bands.get(band)?.data.get(row * self.width + col)?;

        if value.is_nan() || self.nodata == Some(value) {
            return None;
        }
        Some(value)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }
}

/// Rasters addressable by id.
#[derive(Debug, Default, Clone)]
pub struct RasterStore {
    rasters: HashMap<String, Arc<Raster>>,
}

impl RasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raster, replacing any raster with the same id.
    pub fn insert(&mut self, id: impl Into<String>, raster: Raster) {
        self.rasters.insert(id.into(), Arc::new(raster));
    }

    pub fn get(&self, id: &str) -> Option<&Raster> {
        self.rasters.get(id).map(|r| r.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rasters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> GeoTransform {
        GeoTransform::new(10.0, 5.0, 0.5, 0.5)
    }

    #[test]
    fn test_pixel_at() {
        let t = transform();
        assert_eq!(t.pixel_at(10.1, 4.9, 4, 4), Some((0, 0)));
        assert_eq!(t.pixel_at(11.6, 3.4, 4, 4), Some((3, 3)));
        assert_eq!(t.pixel_at(9.9, 4.9, 4, 4), None);
        assert_eq!(t.pixel_at(12.0, 4.9, 4, 4), None);
    }

    #[test]
    fn test_value_at_masks_nodata_and_nan() {
        let raster = Raster::new(
            2,
            1,
            transform(),
            Some(-9999.0),
            vec![Band::new("b1", vec![-9999.0, f32::NAN])],
        )
        .unwrap();
        assert_eq!(raster.value_at(0, 10.2, 4.8), None);
        assert_eq!(raster.value_at(0, 10.7, 4.8), None);

        let raster = Raster::single_band("b1", 2, 1, transform(), vec![1.0, 2.0]).unwrap();
        assert_eq!(raster.value_at(0, 10.7, 4.8), Some(2.0));
        assert_eq!(raster.value_at(1, 10.7, 4.8), None);
    }

    #[test]
    fn test_band_length_checked() {
        let result = Raster::single_band("b1", 2, 2, transform(), vec![1.0; 3]);
        assert!(matches!(result, Err(EngineError::InvalidRaster(_))));
    }

    #[test]
    fn test_bounds() {
        let bounds = transform().bounds(4, 2);
        assert_eq!(bounds, BoundingBox::new(10.0, 4.0, 12.0, 5.0));
    }

    #[test]
    fn test_cell_area_one_degree_at_equator() {
        let area = cell_area_m2(0.0, 1.0, 1.0);
        // ~ 12 364 km² for a 1°x1° cell at the equator
        assert!((area / 1e6 - 12_364.0).abs() < 10.0);
    }
}
