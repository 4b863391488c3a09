//! Mangrove extent, gain and loss areas.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::instrument;

use crate::catalog::{DatasetCatalog, MANGROVE_EXTENT, MANGROVE_GAIN, MANGROVE_LOSS};
use crate::config::AnalysisParams;
use crate::executor::ReductionExecutor;
use crate::results::{AnalysisResult, MetricOutcome, Props};
use crate::types::Aoi;
use crate::zonal::area_sum;

pub const AREA_EXTENT: &str = "area_mangrove_m2";
pub const AREA_GAIN: &str = "area_mangrove_gain_m2";
pub const AREA_LOSS: &str = "area_mangrove_loss_m2";

const AREA_UNITS: &str = "m<sup>2</sup>";

fn metrics() -> [(&'static str, Props); 3] {
    [
        (
            MANGROVE_EXTENT,
            Props::new(AREA_EXTENT, "total_area_of_mangroves", "Mangrove extent", AREA_UNITS),
        ),
        (
            MANGROVE_GAIN,
            Props::new(AREA_GAIN, "total_gain_in_area_of_mangroves", "Mangrove extent gain", AREA_UNITS),
        ),
        (
            MANGROVE_LOSS,
            Props::new(AREA_LOSS, "total_loss_in_area_of_mangroves", "Mangrove extent loss", AREA_UNITS),
        ),
    ]
}

/// Extent, gain and loss areas in m², one outcome per layer.
///
/// A timestamp without a layer contributes zero area.
#[instrument(skip_all, fields(timestamps = timestamps.len()))]
pub async fn land_cover(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Vec<MetricOutcome> {
    let runs = metrics().into_iter().map(|(key, props)| async move {
        let short_name = props.short_name.clone();
        let outcome = match catalog.image_collection(key).await {
            Ok(series) => area_sum(executor, &series, aoi, timestamps, props, params).await,
            Err(e) => Err(e),
        };
        MetricOutcome::new(short_name, outcome.map(AnalysisResult::AreaSum))
    });

    join_all(runs).await
}
