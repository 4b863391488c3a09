//! Mangrove analyser.
//!
//! Loads a dataset catalog manifest and a GeoJSON file of areas of interest,
//! runs the requested analyses over the selected features and writes the
//! flat result dictionary as JSON. Exits with status 2 when any metric could
//! not be computed; the remaining results are still written.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mangrove_common::parse_timestamp;
use zonal_engine::{
    AnalysisParams, AnalysisReport, AnalysisRequest, AnalysisType, EngineConfig, FeatureGeometryProvider,
    GeometryProvider, InMemoryBackend, MangroveAnalyser, MemoryCatalog,
};

/// Mangrove analyser
#[derive(Parser, Debug)]
#[command(name = "analyser")]
#[command(about = "Mangrove extent, properties, carbon and coastline statistics for an area of interest")]
struct Args {
    /// Catalog manifest (YAML or JSON)
    #[arg(long, env = "MANGROVE_CATALOG")]
    catalog: PathBuf,

    /// GeoJSON FeatureCollection holding the areas of interest
    #[arg(long, env = "MANGROVE_FEATURES")]
    features: PathBuf,

    /// Feature ids to analyse; their geometries are combined
    #[arg(long = "fid", required = true)]
    fids: Vec<String>,

    /// Analysis types to run (default: all)
    #[arg(long = "analysis-type")]
    analysis_types: Vec<AnalysisType>,

    /// Timestamps to analyse
    #[arg(long = "timestamp", default_value = "2016-01-01", value_parser = parse_timestamp_arg)]
    timestamps: Vec<DateTime<Utc>>,

    /// Nominal scale in metres (default: ANALYSIS_SCALE or 30)
    #[arg(long)]
    scale: Option<f64>,

    /// Coarsen the scale instead of failing on large areas
    #[arg(long)]
    best_effort: bool,

    /// Coast-to-mangrove buffer distance in metres (default: 200)
    #[arg(long)]
    buffer_distance_m: Option<f64>,

    /// Write results to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for one SLD style per histogram and timestamp
    #[arg(long)]
    styles: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn parse_timestamp_arg(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    info!(fids = ?args.fids, "Starting mangrove analysis");

    let report = run(&args).await?;

    output::write_results(&report, args.output.as_deref())?;
    if let Some(dir) = &args.styles {
        output::write_styles(&report, dir)?;
    }

    for failure in &report.failures {
        error!(
            short_name = %failure.short_name,
            analysis_type = %failure.analysis_type,
            error = %failure.error,
            "Metric not computed"
        );
    }

    info!(
        results = report.results.len(),
        failures = report.failures.len(),
        "Analysis session complete"
    );

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve the AOI, load the catalog and run the analyses.
async fn run(args: &Args) -> Result<AnalysisReport> {
    let config = EngineConfig::from_env();
    config.validate().map_err(|e| anyhow!("Invalid engine configuration: {}", e))?;

    let mut params = AnalysisParams::from_config(&config).with_best_effort(args.best_effort || config.default_best_effort);
    if let Some(scale) = args.scale {
        params = params.with_scale(scale);
    }
    if let Some(distance) = args.buffer_distance_m {
        params = params.with_buffer_distance(distance);
    }

    let provider = FeatureGeometryProvider::from_path(&args.features)
        .with_context(|| format!("Failed to load features from {}", args.features.display()))?;
    let aoi = provider.geometries(&args.fids).context("Failed to resolve AOI")?;

    let catalog = MemoryCatalog::from_manifest(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    info!(datasets = ?catalog.collection_keys(), "Catalog ready");

    let backend = Arc::new(InMemoryBackend::new(catalog.store()));
    let analyser = MangroveAnalyser::new(Arc::new(catalog), backend, &config);

    let mut request = AnalysisRequest::new(Arc::new(aoi), args.timestamps.clone(), params);
    if !args.analysis_types.is_empty() {
        request = request.with_analysis_types(args.analysis_types.clone());
    }

    Ok(analyser.run(&request).await?)
}
