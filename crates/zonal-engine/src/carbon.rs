//! Carbon stocks and total organic carbon histograms.
//!
//! Above-ground biomass is converted to organic carbon as CO2e, soil organic
//! carbon to CO2e, and the two are combined into total organic carbon (TOC).
//! A timestamp missing either layer yields a `None` TOC rather than
//! undercounting it as zero.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::catalog::{DatasetCatalog, MANGROVE_AGB, MANGROVE_SOC, MANGROVE_TOC};
use crate::collection::ImageCollection;
use crate::config::AnalysisParams;
use crate::convert::{bio_to_co2e, oc_to_co2e, per_hectare};
use crate::error::{EngineError, Result};
use crate::executor::ReductionExecutor;
use crate::histogram::{fixed_histogram, FixedHistogram, HistogramSpec};
use crate::results::{AnalysisResult, MetricOutcome, MetricResult, Props};
use crate::timeseries::intersect_timestamps;
use crate::types::Aoi;
use crate::zonal::area_sum_or_null;

pub const AGB_TCO2E: &str = "agb_tco2e";
pub const SOC_TCO2E: &str = "soc_tco2e";
pub const TOC_TCO2E: &str = "toc_tco2e";
pub const TOC_HIST: &str = "toc_hist_tco2eha-1";

const CO2E_UNITS: &str = "t CO<sub>2</sub>e";

// TOC density histogram layout, t CO2e / ha
const TOC_HIST_MIN: f64 = 0.0;
const TOC_HIST_MAX: f64 = 5000.0;
const TOC_HIST_STEP: f64 = 50.0;

fn agb_props() -> Props {
    Props::new(
        AGB_TCO2E,
        "total_mangrove_above_ground_biomass_organic_carbon_as_carbon_dioxide_equivilent",
        "Total above-ground biomass carbon",
        CO2E_UNITS,
    )
}

fn soc_props() -> Props {
    Props::new(
        SOC_TCO2E,
        "total_mangrove_soil_organic_carbon_as_carbon_dioxide_equivilent",
        "Total soil carbon",
        CO2E_UNITS,
    )
}

fn toc_props() -> Props {
    Props::new(
        TOC_TCO2E,
        "total_mangrove_organic_carbon_as_carbon_dioxide_equivilent",
        "Total organic carbon",
        CO2E_UNITS,
    )
}

fn toc_hist_props() -> Props {
    Props::new(
        TOC_HIST,
        "histogram_of_mangrove_total_organic_carbon_density_as_carbon_dioxide_equivilent",
        "Histogram of total organic carbon density",
        "t CO<sub>2</sub>e / ha",
    )
}

/// Per-timestamp sum of two stocks, `None` where either is `None`.
pub fn add_and_mask(agb: &[Option<f64>], soc: &[Option<f64>]) -> Vec<Option<f64>> {
    agb.iter()
        .zip(soc)
        .map(|(a, s)| match (a, s) {
            (Some(a), Some(s)) => Some(a + s),
            _ => None,
        })
        .collect()
}

/// AGB, SOC and TOC stocks in t CO2e over `aoi`.
///
/// Returns one outcome per metric. AGB and SOC are computed independently,
/// so one failing leaves the other intact; TOC fails whenever an input did.
#[instrument(skip_all, fields(timestamps = timestamps.len()))]
pub async fn carbon_sum_area(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Vec<MetricOutcome> {
    let agb = async {
        let series = bio_to_co2e(&catalog.image_collection(MANGROVE_AGB).await?);
        area_sum_or_null(executor, &series, aoi, timestamps, agb_props(), params).await
    };
    let soc = async {
        let series = oc_to_co2e(&catalog.image_collection(MANGROVE_SOC).await?);
        area_sum_or_null(executor, &series, aoi, timestamps, soc_props(), params).await
    };
    let (agb, soc) = futures::join!(agb, soc);

    let toc = match (&agb, &soc) {
        (Ok(agb), Ok(soc)) => {
            let values = add_and_mask(&agb.values, &soc.values);
            let gaps = values.iter().filter(|v| v.is_none()).count();
            if gaps > 0 {
                warn!(gaps, "Total organic carbon missing where a layer has no data");
            }
            Ok(MetricResult::new(toc_props(), values, agb.timestamps.clone(), params))
        }
        (Err(e), _) => Err(EngineError::dependency(TOC_TCO2E, format!("{}: {}", AGB_TCO2E, e))),
        (_, Err(e)) => Err(EngineError::dependency(TOC_TCO2E, format!("{}: {}", SOC_TCO2E, e))),
    };

    info!(
        agb = agb.is_ok(),
        soc = soc.is_ok(),
        toc = toc.is_ok(),
        "Carbon stocks complete"
    );

    vec![
        MetricOutcome::new(AGB_TCO2E, agb.map(AnalysisResult::AreaSum)),
        MetricOutcome::new(SOC_TCO2E, soc.map(AnalysisResult::AreaSum)),
        MetricOutcome::new(TOC_TCO2E, toc.map(AnalysisResult::AreaSum)),
    ]
}

/// TOC density series (t CO2e / ha): AGB plus SOC on each given date.
pub fn toc_density(agb: &ImageCollection, soc: &ImageCollection, timestamps: &[DateTime<Utc>]) -> ImageCollection {
    let images = timestamps
        .iter()
        .filter_map(|timestamp| {
            let (agb, soc) = (agb.first_on(timestamp)?, soc.first_on(timestamp)?);
            Some(
                agb.clone()
                    .add(soc)
                    .rename("toc_co2e")
                    .with_units("t CO2e / ha"),
            )
        })
        .collect();
    ImageCollection::new(MANGROVE_TOC, images)
}

/// Histogram of TOC density over the dates both carbon layers cover.
#[instrument(skip_all, fields(short_name = TOC_HIST))]
pub async fn carbon_histogram(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Result<MetricResult<FixedHistogram>> {
    let agb = per_hectare(&bio_to_co2e(&catalog.image_collection(MANGROVE_AGB).await?));
    let soc = per_hectare(&oc_to_co2e(&catalog.image_collection(MANGROVE_SOC).await?));

    let timestamps = intersect_timestamps(&agb, &soc, timestamps);
    let toc = toc_density(&agb, &soc, &timestamps);

    let legend = catalog
        .legend(MANGROVE_TOC)
        .await
        .ok_or_else(|| EngineError::not_found(format!("legend {}", MANGROVE_TOC)))?;
    let spec = HistogramSpec::from_legend(TOC_HIST_MIN, TOC_HIST_MAX, TOC_HIST_STEP, &legend)?;

    fixed_histogram(executor, &toc, aoi, &timestamps, toc_hist_props(), &spec, params).await
}
