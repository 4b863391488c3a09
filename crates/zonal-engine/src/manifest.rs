//! Catalog manifest loading.
//!
//! A manifest lists the rasters, the time series built from them, vector
//! layers and legend overrides:
//!
//! ```yaml
//! rasters:
//!   extent-2016:
//!     path: ${MANGROVE_DATA:-data}/extent_2016.json
//! collections:
//!   mangrove-agb:
//!     units: t / m2
//!     scale_factor: 0.0001
//!     images:
//!       - raster: agb-2016
//!         timestamp: "2016-01-01"
//! vectors:
//!   coastline-vector:
//!     path: coastline.geojson
//!     timestamp: "2020-06-29"
//! ```
//!
//! Relative paths resolve against the manifest's directory. `${VAR}` and
//! `${VAR:-default}` are substituted from the environment before parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mangrove_common::{parse_timestamp, FeatureCollection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{MemoryCatalog, VectorLayer};
use crate::collection::{Image, ImageCollection};
use crate::error::{EngineError, Result};
use crate::expr::RasterExpr;
use crate::legend::Legend;
use crate::types::{Raster, RasterStore};

/// Where a raster's pixels come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RasterSource {
    /// A JSON file holding one raster.
    File { path: PathBuf },
    /// The raster written out in the manifest.
    Inline(Raster),
}

/// One image of a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub raster: String,
    pub timestamp: String,
}

/// A raster time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub units: String,
    /// Band name of the series; defaults to the key without its `mangrove-` prefix.
    #[serde(default)]
    pub band: Option<String>,
    /// Multiplier applied to every pixel, e.g. 0.0001 for t/ha stored as t/m².
    #[serde(default)]
    pub scale_factor: Option<f64>,
    pub images: Vec<ImageEntry>,
}

/// A GeoJSON vector layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub path: PathBuf,
    pub timestamp: String,
}

/// Parsed catalog manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub rasters: BTreeMap<String, RasterSource>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionEntry>,
    #[serde(default)]
    pub vectors: BTreeMap<String, VectorEntry>,
    #[serde(default)]
    pub legends: BTreeMap<String, Legend>,

    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl CatalogManifest {
    /// Load a manifest; `.json` files parse as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Storage(format!("failed to read manifest {:?}: {}", path, e)))?;
        let expanded = expand_env_vars(&content)?;

        let mut manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&expanded)?,
            _ => Self::from_yaml_str(&expanded)?,
        };
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        debug!(
            path = %path.display(),
            rasters = manifest.rasters.len(),
            collections = manifest.collections.len(),
            vectors = manifest.vectors.len(),
            "Parsed catalog manifest"
        );
        Ok(manifest)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Read every raster and layer and build the catalog.
    pub fn into_catalog(self) -> Result<MemoryCatalog> {
        let mut store = RasterStore::new();
        for (id, source) in &self.rasters {
            let raster = match source {
                RasterSource::Inline(raster) => raster.clone(),
                RasterSource::File { path } => {
                    let path = self.resolve(path);
                    let content = fs::read_to_string(&path).map_err(|e| {
                        EngineError::Storage(format!("raster '{}' at {:?}: {}", id, path, e))
                    })?;
                    serde_json::from_str(&content)?
                }
            };
            raster
                .validate()
                .map_err(|e| EngineError::catalog(format!("raster '{}': {}", id, e)))?;
            store.insert(id.clone(), raster);
        }

        let mut collections = Vec::with_capacity(self.collections.len());
        for (key, entry) in &self.collections {
            collections.push((key.clone(), build_collection(key, entry, &store)?));
        }

        let mut layers = Vec::with_capacity(self.vectors.len());
        for (key, entry) in &self.vectors {
            layers.push((key.clone(), self.load_vector_layer(key, entry)?));
        }

        info!(
            rasters = store.len(),
            collections = collections.len(),
            vectors = layers.len(),
            "Catalog loaded"
        );

        let mut catalog = MemoryCatalog::new(Arc::new(store));
        for (key, collection) in collections {
            catalog = catalog.with_collection(key, collection);
        }
        for (key, layer) in layers {
            catalog = catalog.with_vector_layer(key, layer);
        }
        for (key, legend) in self.legends {
            legend
                .validate()
                .map_err(|e| EngineError::catalog(format!("legend '{}': {}", key, e)))?;
            catalog = catalog.with_legend(key, legend);
        }
        Ok(catalog)
    }

    fn load_vector_layer(&self, key: &str, entry: &VectorEntry) -> Result<VectorLayer> {
        let path = self.resolve(&entry.path);
        let content = fs::read_to_string(&path)
            .map_err(|e| EngineError::Storage(format!("vector layer '{}' at {:?}: {}", key, path, e)))?;
        let fc = FeatureCollection::from_json(&content)?;

        let features = fc
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .map(|g| g.to_geo())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(VectorLayer::new(key, parse_timestamp(&entry.timestamp)?, features))
    }
}

fn build_collection(key: &str, entry: &CollectionEntry, store: &RasterStore) -> Result<ImageCollection> {
    let band = entry
        .band
        .clone()
        .unwrap_or_else(|| key.trim_start_matches("mangrove-").to_string());

    let images = entry
        .images
        .iter()
        .map(|image| {
            if !store.contains(&image.raster) {
                return Err(EngineError::catalog(format!(
                    "collection '{}' refers to unknown raster '{}'",
                    key, image.raster
                )));
            }
            let mut expr = RasterExpr::source(image.raster.as_str());
            if let Some(factor) = entry.scale_factor {
                expr = expr.multiply(factor);
            }
            Ok(Image::new(expr, band.as_str(), parse_timestamp(&image.timestamp)?, entry.units.as_str()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ImageCollection::new(key, images))
}

/// Substitute `${VAR}` and `${VAR:-default}` from the environment.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| EngineError::Config(format!("unclosed variable substitution: ${{{}", after)))?;
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        },
        None => std::env::var(expr.trim())
            .map_err(|_| EngineError::Config(format!("environment variable {} not set", expr))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DatasetCatalog;
    use test_utils::{coastline_feature_collection, temp_dir_with};

    const INLINE: &str = r#"
rasters:
  extent-2016:
    width: 2
    height: 1
    transform: {origin_lon: 0.0, origin_lat: 1.0, pixel_width: 0.5, pixel_height: 1.0}
    bands:
      - name: extent
        data: [1.0, 0.0]
collections:
  mangrove-extent:
    units: "1"
    images:
      - raster: extent-2016
        timestamp: "2016-01-01"
"#;

    #[test]
    fn test_parse_inline_raster() {
        let manifest = CatalogManifest::from_yaml_str(INLINE).unwrap();
        assert!(matches!(manifest.rasters["extent-2016"], RasterSource::Inline(_)));
        assert_eq!(manifest.collections["mangrove-extent"].images.len(), 1);
    }

    #[tokio::test]
    async fn test_into_catalog() {
        let catalog = CatalogManifest::from_yaml_str(INLINE).unwrap().into_catalog().unwrap();
        let extent = catalog.image_collection("mangrove-extent").await.unwrap();
        assert_eq!(extent.images()[0].band_name, "extent");
        assert_eq!(extent.images()[0].units, "1");
        assert!(catalog.store().contains("extent-2016"));
    }

    #[test]
    fn test_unknown_raster_reference() {
        let yaml = r#"
collections:
  mangrove-agb:
    units: t / m2
    images:
      - raster: missing
        timestamp: "2016-01-01"
"#;
        let err = CatalogManifest::from_yaml_str(yaml).unwrap().into_catalog().unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }

    #[tokio::test]
    async fn test_load_from_files() {
        let raster = r#"{"width": 1, "height": 1,
            "transform": {"origin_lon": 0.0, "origin_lat": 1.0, "pixel_width": 1.0, "pixel_height": 1.0},
            "bands": [{"name": "agb", "data": [2500.0]}]}"#;
        let manifest = r#"{
            "rasters": {"agb-2016": {"path": "agb.json"}},
            "collections": {"mangrove-agb": {"units": "t / m2", "scale_factor": 0.0001,
                "images": [{"raster": "agb-2016", "timestamp": "2016-01-01"}]}},
            "vectors": {"coastline-vector": {"path": "coast.geojson", "timestamp": "2020-06-29"}}
        }"#;
        let coast = coastline_feature_collection();
        let (_dir, paths) = temp_dir_with(&[
            ("catalog.json", manifest),
            ("agb.json", raster),
            ("coast.geojson", coast.as_str()),
        ])
        .unwrap();

        let catalog = MemoryCatalog::from_manifest(&paths[0]).unwrap();
        let agb = catalog.image_collection("mangrove-agb").await.unwrap();
        assert_eq!(agb.images()[0].expr, RasterExpr::source("agb-2016").multiply(0.0001));

        let coastline = catalog.vector_layer("coastline-vector").await.unwrap();
        assert_eq!(coastline.features.len(), 1);
        assert_eq!(coastline.timestamp, parse_timestamp("2020-06-29").unwrap());
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("MANGROVE_MANIFEST_TEST_DIR", "/data/atlas");
        let out = expand_env_vars("path: ${MANGROVE_MANIFEST_TEST_DIR}/x.json").unwrap();
        assert_eq!(out, "path: /data/atlas/x.json");

        let defaulted = expand_env_vars("path: ${MANGROVE_MANIFEST_UNSET_VAR:-data}/x.json").unwrap();
        assert_eq!(defaulted, "path: data/x.json");

        assert!(expand_env_vars("path: ${UNCLOSED").is_err());
    }
}
