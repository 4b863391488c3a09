//! Dataset catalog and AOI geometry provider.
//!
//! The catalog resolves dataset keys (`mangrove-extent`, `mangrove-agb`,
//! `coastline-vector`, ...) to raster time series and vector layers. The
//! geometry provider resolves feature ids to AOI polygons.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::{Geometry, MultiPolygon};
use mangrove_common::{AtlasError, AtlasResult, FeatureCollection};
use tracing::{debug, warn};

use crate::collection::ImageCollection;
use crate::error::{EngineError, Result};
use crate::legend::{builtin_legend, Legend};
use crate::manifest::CatalogManifest;
use crate::types::RasterStore;

/// Mangrove presence, 1 where present.
pub const MANGROVE_EXTENT: &str = "mangrove-extent";
/// Extent gained since the baseline year.
pub const MANGROVE_GAIN: &str = "mangrove-gain";
/// Extent lost since the baseline year.
pub const MANGROVE_LOSS: &str = "mangrove-loss";
/// Distance to the nearest mangrove pixel, metres.
pub const MANGROVE_DISTANCE: &str = "mangrove-distance";
/// Above-ground biomass density, t/m².
pub const MANGROVE_AGB: &str = "mangrove-agb";
/// Maximum canopy height, metres.
pub const MANGROVE_HMAX: &str = "mangrove-hmax";
/// Basal-area weighted canopy height, metres.
pub const MANGROVE_HBA: &str = "mangrove-hba";
/// Soil organic carbon density, t/m².
pub const MANGROVE_SOC: &str = "mangrove-soc";
/// Legend key of total organic carbon density.
pub const MANGROVE_TOC: &str = "mangrove-toc";
/// Coastline line strings.
pub const COASTLINE_VECTOR: &str = "coastline-vector";
/// Conservation hotspot polygons.
pub const MANGROVE_HOTSPOTS: &str = "mangrove-hotspots";

/// A timestamped vector layer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<Geometry<f64>>,
}

impl VectorLayer {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>, features: Vec<Geometry<f64>>) -> Self {
        Self {
            name: name.into(),
            timestamp,
            features,
        }
    }
}

/// Trait for dataset lookups by key.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Raster time series stored under `key`.
    ///
    /// # Returns
    /// * `EngineError::NotFound` when the key names no raster series
    async fn image_collection(&self, key: &str) -> Result<ImageCollection>;

    /// Vector layer stored under `key`.
    async fn vector_layer(&self, key: &str) -> Result<Arc<VectorLayer>>;

    /// Display legend for `key`, if one is published.
    async fn legend(&self, key: &str) -> Option<Legend>;
}

/// Catalog held entirely in memory, typically loaded from a manifest.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    store: Arc<RasterStore>,
    collections: HashMap<String, ImageCollection>,
    vectors: HashMap<String, Arc<VectorLayer>>,
    legends: HashMap<String, Legend>,
}

impl MemoryCatalog {
    pub fn new(store: Arc<RasterStore>) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    /// Load a catalog from a YAML or JSON manifest.
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        CatalogManifest::from_path(path.as_ref())?.into_catalog()
    }

    pub fn with_collection(mut self, key: impl Into<String>, collection: ImageCollection) -> Self {
        self.collections.insert(key.into(), collection);
        self
    }

    pub fn with_vector_layer(mut self, key: impl Into<String>, layer: VectorLayer) -> Self {
        self.vectors.insert(key.into(), Arc::new(layer));
        self
    }

    /// Override the published legend of a key.
    pub fn with_legend(mut self, key: impl Into<String>, legend: Legend) -> Self {
        self.legends.insert(key.into(), legend);
        self
    }

    /// Rasters the catalog's expressions refer to.
    pub fn store(&self) -> Arc<RasterStore> {
        Arc::clone(&self.store)
    }

    /// Keys of all raster series, sorted.
    pub fn collection_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[async_trait]
impl DatasetCatalog for MemoryCatalog {
    async fn image_collection(&self, key: &str) -> Result<ImageCollection> {
        self.collections
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(key))
    }

    async fn vector_layer(&self, key: &str) -> Result<Arc<VectorLayer>> {
        self.vectors
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(key))
    }

    async fn legend(&self, key: &str) -> Option<Legend> {
        self.legends.get(key).cloned().or_else(|| builtin_legend(key))
    }
}

/// Trait for resolving feature ids to AOI geometries.
pub trait GeometryProvider: Send + Sync {
    /// Polygon or multipolygon of one feature.
    fn geometry(&self, fid: &str) -> AtlasResult<MultiPolygon<f64>>;

    /// All polygons of several features combined into one multipolygon.
    fn geometries(&self, fids: &[String]) -> AtlasResult<MultiPolygon<f64>> {
        if fids.is_empty() {
            return Err(AtlasError::MissingParameter("fid".to_string()));
        }

        let mut polygons = Vec::new();
        for fid in fids {
            polygons.extend(self.geometry(fid)?.0);
        }
        Ok(MultiPolygon::new(polygons))
    }
}

/// Geometry provider over a GeoJSON FeatureCollection keyed by feature id.
#[derive(Debug, Clone)]
pub struct FeatureGeometryProvider {
    features: FeatureCollection,
}

impl FeatureGeometryProvider {
    pub fn new(features: FeatureCollection) -> Self {
        let unnamed = features.features.iter().filter(|f| f.identifier().is_none()).count();
        if unnamed > 0 {
            warn!(unnamed, "Features without an id cannot be selected");
        }
        Self { features }
    }

    pub fn from_json(json: &str) -> AtlasResult<Self> {
        Ok(Self::new(FeatureCollection::from_json(json)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> AtlasResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AtlasError::DataReadError(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded AOI features");
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.features.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.features.is_empty()
    }
}

impl GeometryProvider for FeatureGeometryProvider {
    fn geometry(&self, fid: &str) -> AtlasResult<MultiPolygon<f64>> {
        let feature = self
            .features
            .find(fid)
            .ok_or_else(|| AtlasError::FeatureNotFound(fid.to_string()))?;
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| AtlasError::InvalidGeometry(format!("feature '{}' has no geometry", fid)))?;
        geometry.to_multi_polygon()
    }
}
