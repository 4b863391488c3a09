//! Coastline length, in total and where mangroves line it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use mangrove_common::format_timestamp;
use tracing::{debug, info, instrument};

use crate::backend::Reducer;
use crate::catalog::{DatasetCatalog, COASTLINE_VECTOR, MANGROVE_DISTANCE};
use crate::config::AnalysisParams;
use crate::error::{ReductionFault, Result};
use crate::executor::{or_fallback, ReductionExecutor};
use crate::geometry::{check_has_holes, geodesic_length, intersect_and_simplify, line_work, remove_holes};
use crate::results::{MetricResult, Props};
use crate::types::Aoi;

pub const LENGTH_COAST: &str = "length_coast_m";
pub const LENGTH_MANGROVE: &str = "length_mangrove_m";

fn coast_props() -> Props {
    Props::new(LENGTH_COAST, "length_of_coastline", "Total length of coastline", "m")
}

fn mangrove_props() -> Props {
    Props::new(
        LENGTH_MANGROVE,
        "length_of_coast_with_mangrove_cover",
        "Length of coast with mangroves",
        "m",
    )
}

/// Length of the coastline layer clipped to `aoi`.
///
/// The coastline is a single snapshot, so the result has one value stamped
/// with the layer's own timestamp rather than the requested ones.
#[instrument(skip_all, fields(short_name = LENGTH_COAST))]
pub async fn length_coastline(
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    params: &AnalysisParams,
) -> Result<MetricResult<f64>> {
    let layer = catalog.vector_layer(COASTLINE_VECTOR).await?;
    let clipped = intersect_and_simplify(&layer.features, aoi, params.scale);
    let length = geodesic_length(&clipped);

    info!(length_m = length, pieces = clipped.len(), "Coastline length complete");
    Ok(MetricResult::new(coast_props(), vec![length], vec![layer.timestamp], params))
}

/// Length of coastline within `buffer_distance_m` of mangroves, per timestamp.
///
/// Holes are removed from the AOI first so coast inside enclosed water
/// still counts; the result records which AOI parts had holes. A timestamp
/// without a distance raster, or where no coast falls inside the AOI,
/// measures 0.
///
/// # Arguments
/// * `catalog` - Source of the coastline layer and the mangrove distance series
/// * `aoi` - Area of interest, possibly with holes
/// * `timestamps` - Requested timestamps
/// * `params` - Scale, best effort and buffer distance
#[instrument(skip_all, fields(short_name = LENGTH_MANGROVE, buffer_m = params.buffer_distance_m))]
pub async fn length_mangroves(
    executor: &ReductionExecutor,
    catalog: &dyn DatasetCatalog,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    params: &AnalysisParams,
) -> Result<MetricResult<f64>> {
    let has_holes = check_has_holes(aoi);
    let filled: Aoi = Arc::new(remove_holes(aoi));

    let layer = catalog.vector_layer(COASTLINE_VECTOR).await?;
    let lines = Arc::new(line_work(&intersect_and_simplify(&layer.features, &filled, params.scale)));
    debug!(lines = lines.0.len(), "Coastline clipped to filled AOI");

    let series = catalog.image_collection(MANGROVE_DISTANCE).await?;
    let series = &series;
    let filled = &filled;

    let cells = timestamps.iter().map(|timestamp| {
        let reducer = Reducer::MaskedLength {
            lines: Arc::clone(&lines),
            max_value: params.buffer_distance_m,
        };
        async move {
            let label = format_timestamp(timestamp);
            let outcome = executor
                .reduce_image(series.first_on(timestamp), &label, filled, reducer, params)
                .await
                .and_then(|reduction| reduction.into_length());
            or_fallback(outcome, LENGTH_MANGROVE, &label, || 0.0)
        }
    });

    let values = join_all(cells)
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, ReductionFault>>()?;

    info!(timestamps = values.len(), "Mangrove coast length complete");

    let mut result = MetricResult::new(mangrove_props(), values, timestamps.to_vec(), params);
    result.buffer_distance_m = Some(params.buffer_distance_m);
    result.has_holes = Some(has_holes);
    Ok(result)
}
