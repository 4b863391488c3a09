//! Writing the result dictionary and histogram styles.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use zonal_engine::{to_style_ramp, AnalysisReport};

/// Write the flat result dictionary as pretty JSON to `output`, or stdout.
pub fn write_results(report: &AnalysisReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.results).context("Failed to serialise results")?;

    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), results = report.results.len(), "Results written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

/// Write one SLD colour map per histogram and timestamp into `dir`.
///
/// Files are named `<short_name>_<YYYY-MM-DD>.sld`.
pub fn write_styles(report: &AnalysisReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (short_name, result) in report.results.iter() {
        let Some(histograms) = result.as_histogram() else {
            continue;
        };
        for (histogram, timestamp) in histograms.values.iter().zip(&histograms.timestamps) {
            let path = dir.join(style_file_name(short_name, timestamp));
            fs::write(&path, to_style_ramp(histogram))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), styles = written.len(), "Styles written");
    Ok(written)
}

fn style_file_name(short_name: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}_{}.sld", short_name, timestamp.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_common::parse_timestamp;
    use zonal_engine::{AnalysisParams, AnalysisResult, HistogramSpec, Legend, MetricResult, Props, ResultMap};

    fn report() -> AnalysisReport {
        let legend = Legend::new(vec![0.0, 50.0], vec![50.0, 100.0], &["#000000", "#ffffff"], Vec::new()).unwrap();
        let spec = HistogramSpec::from_legend(0.0, 100.0, 10.0, &legend).unwrap();
        let histogram = spec.histogram_from_counts(&[(0.0, 4), (60.0, 2)]);

        let mut results = ResultMap::new();
        results
            .insert(AnalysisResult::FixedHistogram(MetricResult::new(
                Props::new("hmax_mangrove_hist_m", "histogram_of_mangrove_maximum_canopy_height", "Histogram", "m"),
                vec![histogram],
                vec![parse_timestamp("2016-01-01").unwrap()],
                &AnalysisParams::default(),
            )))
            .unwrap();
        results
            .insert(AnalysisResult::AreaSum(MetricResult::new(
                Props::new("area_mangrove_m2", "total_area_of_mangroves", "Mangrove extent", "m<sup>2</sup>"),
                vec![Some(12.5)],
                vec![parse_timestamp("2016-01-01").unwrap()],
                &AnalysisParams::default(),
            )))
            .unwrap();

        AnalysisReport {
            results,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_write_results_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_results(&report(), Some(&path)).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["area_mangrove_m2"]["values"][0], 12.5);
        assert_eq!(json["hmax_mangrove_hist_m"]["values"][0]["group_values"], serde_json::json!([4, 2]));
    }

    #[test]
    fn test_styles_only_for_histograms() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_styles(&report(), dir.path()).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("hmax_mangrove_hist_m_2016-01-01.sld"));
        let sld = fs::read_to_string(&written[0]).unwrap();
        assert!(sld.contains("#000000"));
    }
}
