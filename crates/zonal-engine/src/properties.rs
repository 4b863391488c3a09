//! Above-ground biomass and canopy height: histograms and summary statistics.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::catalog::{DatasetCatalog, MANGROVE_AGB, MANGROVE_HMAX};
use crate::collection::ImageCollection;
use crate::config::AnalysisParams;
use crate::convert::per_hectare;
use crate::error::{EngineError, Result};
use crate::executor::ReductionExecutor;
use crate::histogram::{fixed_histogram, FixedHistogram, HistogramSpec};
use crate::results::{AnalysisResult, MetricOutcome, MetricResult, Props};
use crate::types::Aoi;
use crate::zonal::area_summary_stats;

pub const AGB_HIST: &str = "agb_mangrove_hist_tha-1";
pub const HMAX_HIST: &str = "hmax_mangrove_hist_m";
pub const AGB_STATS: &str = "agb_mangrove_tha-1";
pub const HMAX_STATS: &str = "hmax_mangrove_m";

/// Histogram layout of one dataset.
struct HistogramLayout {
    key: &'static str,
    min: f64,
    max: f64,
    step: f64,
}

const AGB_LAYOUT: HistogramLayout = HistogramLayout {
    key: MANGROVE_AGB,
    min: 0.0,
    max: 1000.0,
    step: 10.0,
};

const HMAX_LAYOUT: HistogramLayout = HistogramLayout {
    key: MANGROVE_HMAX,
    min: 0.0,
    max: 100.0,
    step: 1.0,
};

fn agb_hist_props() -> Props {
    Props::new(
        AGB_HIST,
        "histogram_of_mangrove_aboveground_biomass_density",
        "Histogram of mangrove above-ground biomass density",
        "t / ha",
    )
}

fn hmax_hist_props() -> Props {
    Props::new(
        HMAX_HIST,
        "histogram_of_mangrove_maximum_canopy_height",
        "Histogram of mangrove maximum canopy height",
        "m",
    )
}

fn agb_stats_props() -> Props {
    Props::new(
        AGB_STATS,
        "summary_stats_of_mangrove_aboveground_biomass_density",
        "Mangrove above-ground biomass density",
        "t / ha",
    )
}

fn hmax_stats_props() -> Props {
    Props::new(
        HMAX_STATS,
        "summary_stats_of_mangrove_maximum_canopy_height",
        "Mangrove maximum canopy height",
        "m",
    )
}

/// AGB in t/ha; the catalog stores t/m².
async fn agb_density(catalog: &dyn DatasetCatalog) -> Result<ImageCollection> {
    Ok(per_hectare(&catalog.image_collection(MANGROVE_AGB).await?))
}

async fn histogram_of(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    series: Result<ImageCollection>,
    layout: &HistogramLayout,
    props: Props,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Result<MetricResult<FixedHistogram>> {
    let series = series?;
    let legend = catalog
        .legend(layout.key)
        .await
        .ok_or_else(|| EngineError::not_found(format!("legend {}", layout.key)))?;
    let spec = HistogramSpec::from_legend(layout.min, layout.max, layout.step, &legend)?;
    fixed_histogram(executor, &series, aoi, timestamps, props, &spec, params).await
}

/// Biomass and canopy height histograms plus summary statistics.
///
/// Returns four outcomes, each independent of the others.
#[instrument(skip_all, fields(timestamps = timestamps.len()))]
pub async fn mangrove_properties(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Vec<MetricOutcome> {
    let agb_hist = async {
        let series = agb_density(catalog).await;
        histogram_of(executor, catalog, series, &AGB_LAYOUT, agb_hist_props(), aoi, timestamps, params).await
    };
    let hmax_hist = async {
        let series = catalog.image_collection(MANGROVE_HMAX).await;
        histogram_of(executor, catalog, series, &HMAX_LAYOUT, hmax_hist_props(), aoi, timestamps, params).await
    };
    let agb_stats = async {
        let series = agb_density(catalog).await?;
        area_summary_stats(executor, &series, aoi, timestamps, agb_stats_props(), params).await
    };
    let hmax_stats = async {
        let series = catalog.image_collection(MANGROVE_HMAX).await?;
        area_summary_stats(executor, &series, aoi, timestamps, hmax_stats_props(), params).await
    };

    let (agb_hist, hmax_hist, agb_stats, hmax_stats) = futures::join!(agb_hist, hmax_hist, agb_stats, hmax_stats);

    vec![
        MetricOutcome::new(AGB_HIST, agb_hist.map(AnalysisResult::FixedHistogram)),
        MetricOutcome::new(HMAX_HIST, hmax_hist.map(AnalysisResult::FixedHistogram)),
        MetricOutcome::new(AGB_STATS, agb_stats.map(AnalysisResult::SummaryStats)),
        MetricOutcome::new(HMAX_STATS, hmax_stats.map(AnalysisResult::SummaryStats)),
    ]
}
