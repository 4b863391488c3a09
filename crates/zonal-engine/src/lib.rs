//! Zonal statistics engine for mangrove analyses.
//!
//! This crate computes per-AOI, per-timestamp metrics over raster time
//! series and vector layers:
//!
//! - **Land cover**: mangrove extent, gain and loss areas
//! - **Properties**: biomass and canopy height histograms and statistics
//! - **Carbon**: above-ground, soil and total organic carbon as CO2e
//! - **Coast**: coastline length and the part lined by mangroves
//!
//! # Architecture
//!
//! ```text
//! AnalysisRequest
//!      │
//!      ▼
//! MangroveAnalyser::run(request)
//!      │
//!      ├─► DatasetCatalog: key → ImageCollection / VectorLayer / Legend
//!      │
//!      ├─► Build image expressions (unit conversion, per-hectare, AGB + SOC)
//!      │
//!      ├─► ReductionExecutor: one ReductionRequest per (metric, timestamp)
//!      │         │
//!      │         └─► RasterBackend::reduce → value or ReductionFault
//!      │
//!      └─► Fallback policy per cell, merge into ResultMap
//!               │
//!               ▼
//!          AnalysisReport { results, failures }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zonal_engine::{AnalysisParams, AnalysisRequest, EngineConfig, InMemoryBackend,
//!     MangroveAnalyser, MemoryCatalog};
//!
//! let catalog = MemoryCatalog::from_manifest("catalog.yaml")?;
//! let backend = Arc::new(InMemoryBackend::new(catalog.store()));
//! let config = EngineConfig::from_env();
//! let analyser = MangroveAnalyser::new(Arc::new(catalog), backend, &config);
//!
//! let request = AnalysisRequest::new(aoi, timestamps, AnalysisParams::from_config(&config));
//! let report = analyser.run(&request).await?;
//! println!("{}", serde_json::to_string_pretty(&report.results)?);
//! ```

pub mod backend;
pub mod carbon;
pub mod catalog;
pub mod coast;
pub mod collection;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod expr;
pub mod geometry;
pub mod histogram;
pub mod landcover;
pub mod legend;
pub mod manifest;
pub mod properties;
pub mod results;
pub mod timeseries;
pub mod types;
pub mod zonal;

// Re-export commonly used types at crate root
pub use backend::{InMemoryBackend, RasterBackend, Reducer, ReductionRequest, SummaryStats};
pub use catalog::{DatasetCatalog, FeatureGeometryProvider, GeometryProvider, MemoryCatalog, VectorLayer};
pub use collection::{Image, ImageCollection};
pub use config::{AnalysisParams, EngineConfig};
pub use convert::UnitConversion;
pub use dispatch::{AnalysisRequest, AnalysisType, MangroveAnalyser};
pub use error::{EngineError, ReductionFault, Result};
pub use executor::ReductionExecutor;
pub use expr::RasterExpr;
pub use histogram::{to_style_ramp, FixedHistogram, HistogramSpec};
pub use legend::Legend;
pub use manifest::CatalogManifest;
pub use results::{AnalysisReport, AnalysisResult, MetricFailure, MetricOutcome, MetricResult, Props, ResultMap};
pub use types::{Aoi, GeoTransform, Raster, RasterStore};
