//! Analysis dispatcher.
//!
//! Routes a request for a set of analysis types to their components, runs
//! them concurrently and merges the outcomes into one flat short_name-keyed
//! report. A metric that fails is listed in the report's failures; its
//! siblings still complete.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use geo::Area;
use mangrove_common::{AtlasError, AtlasResult};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::backend::RasterBackend;
use crate::carbon::{carbon_histogram, carbon_sum_area, TOC_HIST};
use crate::catalog::DatasetCatalog;
use crate::coast::{length_coastline, length_mangroves, LENGTH_COAST, LENGTH_MANGROVE};
use crate::config::{AnalysisParams, EngineConfig};
use crate::error::Result;
use crate::executor::ReductionExecutor;
use crate::landcover::land_cover;
use crate::properties::mangrove_properties;
use crate::results::{AnalysisReport, AnalysisResult, MetricFailure, MetricOutcome};
use crate::types::Aoi;

/// A group of metrics requested together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    LengthCoast,
    LandCover,
    MangroveProperties,
    MangroveCarbon,
}

impl AnalysisType {
    /// Every analysis type, in report order.
    pub fn all() -> [AnalysisType; 4] {
        [
            Self::LengthCoast,
            Self::LandCover,
            Self::MangroveProperties,
            Self::MangroveCarbon,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LengthCoast => "length-coast",
            Self::LandCover => "land-cover",
            Self::MangroveProperties => "mangrove-properties",
            Self::MangroveCarbon => "mangrove-carbon",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = AtlasError;

    /// Keywords are matched case-sensitively.
    fn from_str(s: &str) -> AtlasResult<Self> {
        Self::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                AtlasError::invalid_parameter(
                    "analysis_type",
                    format!(
                        "unknown analysis type '{}', expected one of: {}",
                        s,
                        Self::all().map(|t| t.as_str()).join(", ")
                    ),
                )
            })
    }
}

/// Everything one dispatcher call needs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub analysis_types: Vec<AnalysisType>,
    pub aoi: Aoi,
    pub timestamps: Vec<DateTime<Utc>>,
    pub params: AnalysisParams,
}

impl AnalysisRequest {
    /// A request for every analysis type.
    pub fn new(aoi: Aoi, timestamps: Vec<DateTime<Utc>>, params: AnalysisParams) -> Self {
        Self {
            analysis_types: AnalysisType::all().to_vec(),
            aoi,
            timestamps,
            params,
        }
    }

    pub fn with_analysis_types(mut self, analysis_types: Vec<AnalysisType>) -> Self {
        self.analysis_types = analysis_types;
        self
    }

    /// Reject requests no analysis could serve.
    pub fn validate(&self) -> AtlasResult<()> {
        self.params.validate()?;

        if self.timestamps.is_empty() {
            return Err(AtlasError::MissingParameter("timestamp".to_string()));
        }

        if self.aoi.0.is_empty() || self.aoi.unsigned_area() == 0.0 {
            return Err(AtlasError::InvalidGeometry("AOI has no area".to_string()));
        }

        Ok(())
    }

    /// Requested types without repeats, in report order.
    fn distinct_types(&self) -> Vec<AnalysisType> {
        let mut types = self.analysis_types.clone();
        types.sort_unstable();
        types.dedup();
        types
    }
}

/// Runs mangrove analyses against a dataset catalog and a raster backend.
#[derive(Clone)]
pub struct MangroveAnalyser {
    catalog: Arc<dyn DatasetCatalog>,
    executor: ReductionExecutor,
}

impl MangroveAnalyser {
    pub fn new(catalog: Arc<dyn DatasetCatalog>, backend: Arc<dyn RasterBackend>, config: &EngineConfig) -> Self {
        Self {
            catalog,
            executor: ReductionExecutor::new(backend, config),
        }
    }

    /// Run every requested analysis type and merge the results.
    ///
    /// # Returns
    /// The merged report, with per-metric failures listed beside the
    /// results. Errors only when the request is invalid or two metrics
    /// produce the same short_name.
    #[instrument(skip_all, fields(types = request.analysis_types.len(), timestamps = request.timestamps.len()))]
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        request.validate()?;

        let types = request.distinct_types();
        let runs = types.iter().map(|analysis_type| async move {
            (*analysis_type, self.run_type(*analysis_type, request).await)
        });
        let completed = join_all(runs).await;

        let mut report = AnalysisReport::default();
        for (analysis_type, outcomes) in completed {
            for MetricOutcome { short_name, outcome } in outcomes {
                match outcome {
                    Ok(result) => report.results.insert(result)?,
                    Err(e) => {
                        warn!(short_name = %short_name, analysis_type = %analysis_type, error = %e, "Metric failed");
                        counter!("analysis_metric_failures_total", "analysis_type" => analysis_type.as_str())
                            .increment(1);
                        report.failures.push(MetricFailure {
                            short_name,
                            analysis_type: analysis_type.as_str().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            results = report.results.len(),
            failures = report.failures.len(),
            "Analysis complete"
        );
        Ok(report)
    }

    async fn run_type(&self, analysis_type: AnalysisType, request: &AnalysisRequest) -> Vec<MetricOutcome> {
        let executor = &self.executor;
        let catalog = self.catalog.as_ref();
        let (aoi, timestamps, params) = (&request.aoi, request.timestamps.as_slice(), &request.params);

        match analysis_type {
            AnalysisType::LandCover => land_cover(executor, catalog, aoi, timestamps, params).await,
            AnalysisType::MangroveProperties => mangrove_properties(executor, catalog, aoi, timestamps, params).await,
            AnalysisType::MangroveCarbon => {
                let (mut outcomes, histogram) = futures::join!(
                    carbon_sum_area(executor, catalog, aoi, timestamps, params),
                    carbon_histogram(executor, catalog, aoi, timestamps, params)
                );
                outcomes.push(MetricOutcome::new(TOC_HIST, histogram.map(AnalysisResult::FixedHistogram)));
                outcomes
            }
            AnalysisType::LengthCoast => {
                let (coast, mangroves) = futures::join!(
                    length_coastline(catalog, aoi, params),
                    length_mangroves(executor, catalog, aoi, timestamps, params)
                );
                vec![
                    MetricOutcome::new(LENGTH_COAST, coast.map(AnalysisResult::Length)),
                    MetricOutcome::new(LENGTH_MANGROVE, mangroves.map(AnalysisResult::Length)),
                ]
            }
        }
    }
}
