//! Result model and the flat short_name-keyed result dictionary.
//!
//! Every metric produces one [`AnalysisResult`] variant. Results are merged
//! into a [`ResultMap`] that rejects duplicate short names, and serialise to
//! the flat JSON object consumed by clients:
//!
//! ```text
//! {
//!   "area_mangrove_m2": {
//!     "values": [1143883236.09],
//!     "timestamps": ["2016-01-01T00:00:00"],
//!     "scale": 30.0,
//!     "bestEffort": false,
//!     "short_name": "area_mangrove_m2",
//!     "standard_name": "total_area_of_mangroves",
//!     "title": "Mangrove extent",
//!     "units": "m<sup>2</sup>"
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mangrove_common::{format_timestamp, AtlasError, AtlasResult};
use serde::{Serialize, Serializer};

use crate::backend::SummaryStats;
use crate::config::AnalysisParams;
use crate::error::Result;
use crate::histogram::FixedHistogram;

/// Static metadata describing a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Props {
    pub short_name: String,
    pub standard_name: String,
    pub title: String,
    pub units: String,
}

impl Props {
    pub fn new(short_name: &str, standard_name: &str, title: &str, units: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            standard_name: standard_name.to_string(),
            title: title.to_string(),
            units: units.to_string(),
        }
    }
}

/// A metric evaluated over a list of timestamps, one value per timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult<V> {
    pub values: Vec<V>,

    #[serde(serialize_with = "serialize_timestamps")]
    pub timestamps: Vec<DateTime<Utc>>,

    /// Nominal scale; advisory only when `best_effort` is set.
    pub scale: f64,

    #[serde(rename = "bestEffort")]
    pub best_effort: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_distance_m: Option<f64>,

    #[serde(
        rename = "hasHoles",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_has_holes"
    )]
    pub has_holes: Option<Vec<bool>>,

    #[serde(flatten)]
    pub props: Props,
}

impl<V> MetricResult<V> {
    pub fn new(props: Props, values: Vec<V>, timestamps: Vec<DateTime<Utc>>, params: &AnalysisParams) -> Self {
        Self {
            values,
            timestamps,
            scale: params.scale,
            best_effort: params.best_effort,
            buffer_distance_m: None,
            has_holes: None,
            props,
        }
    }
}

fn serialize_timestamps<S: Serializer>(timestamps: &[DateTime<Utc>], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(timestamps.iter().map(format_timestamp))
}

// Published as 0/1 flags
fn serialize_has_holes<S: Serializer>(flags: &Option<Vec<bool>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match flags {
        Some(flags) => s.collect_seq(flags.iter().map(|f| u8::from(*f))),
        None => s.serialize_none(),
    }
}

/// One computed metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    /// Area-weighted sums; `None` marks a slot with no data.
    AreaSum(MetricResult<Option<f64>>),
    /// Summary statistics; `None` marks a timestamp with no raster.
    SummaryStats(MetricResult<Option<SummaryStats>>),
    /// One fixed histogram per timestamp.
    FixedHistogram(MetricResult<FixedHistogram>),
    /// Lengths in metres.
    Length(MetricResult<f64>),
}

impl AnalysisResult {
    pub fn short_name(&self) -> &str {
        &self.props().short_name
    }

    pub fn props(&self) -> &Props {
        match self {
            Self::AreaSum(r) => &r.props,
            Self::SummaryStats(r) => &r.props,
            Self::FixedHistogram(r) => &r.props,
            Self::Length(r) => &r.props,
        }
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        match self {
            Self::AreaSum(r) => &r.timestamps,
            Self::SummaryStats(r) => &r.timestamps,
            Self::FixedHistogram(r) => &r.timestamps,
            Self::Length(r) => &r.timestamps,
        }
    }

    pub fn as_area_sum(&self) -> Option<&MetricResult<Option<f64>>> {
        match self {
            Self::AreaSum(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_summary_stats(&self) -> Option<&MetricResult<Option<SummaryStats>>> {
        match self {
            Self::SummaryStats(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&MetricResult<FixedHistogram>> {
        match self {
            Self::FixedHistogram(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_length(&self) -> Option<&MetricResult<f64>> {
        match self {
            Self::Length(r) => Some(r),
            _ => None,
        }
    }
}

/// Results keyed by short_name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultMap(BTreeMap<String, AnalysisResult>);

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result; a second result with the same short_name is rejected.
    pub fn insert(&mut self, result: AnalysisResult) -> AtlasResult<()> {
        let key = result.short_name().to_string();
        if self.0.contains_key(&key) {
            return Err(AtlasError::DuplicateResult(key));
        }
        self.0.insert(key, result);
        Ok(())
    }

    /// Union with another map. Nothing is merged if any short_name collides.
    pub fn merge(&mut self, other: ResultMap) -> AtlasResult<()> {
        if let Some(key) = other.0.keys().find(|k| self.0.contains_key(*k)) {
            return Err(AtlasError::DuplicateResult(key.clone()));
        }
        self.0.extend(other.0);
        Ok(())
    }

    pub fn get(&self, short_name: &str) -> Option<&AnalysisResult> {
        self.0.get(short_name)
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.0.contains_key(short_name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnalysisResult)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of computing one named metric.
#[derive(Debug)]
pub struct MetricOutcome {
    pub short_name: String,
    pub outcome: Result<AnalysisResult>,
}

impl MetricOutcome {
    pub fn new(short_name: impl Into<String>, outcome: Result<AnalysisResult>) -> Self {
        Self {
            short_name: short_name.into(),
            outcome,
        }
    }
}

/// A metric that could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFailure {
    pub short_name: String,
    pub analysis_type: String,
    pub error: String,
}

/// Everything a dispatcher call produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub results: ResultMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MetricFailure>,
}

impl AnalysisReport {
    /// Whether every requested metric was computed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_common::parse_timestamp;
    use serde_json::json;

    fn area(short_name: &str, values: Vec<Option<f64>>) -> AnalysisResult {
        AnalysisResult::AreaSum(MetricResult::new(
            Props::new(short_name, "total_area_of_mangroves", "Mangrove extent", "m<sup>2</sup>"),
            values,
            vec![parse_timestamp("2016-01-01").unwrap()],
            &AnalysisParams::default(),
        ))
    }

    #[test]
    fn test_area_sum_serialises_flat() {
        let value = serde_json::to_value(area("area_mangrove_m2", vec![Some(12.5)])).unwrap();
        assert_eq!(
            value,
            json!({
                "values": [12.5],
                "timestamps": ["2016-01-01T00:00:00"],
                "scale": 30.0,
                "bestEffort": false,
                "short_name": "area_mangrove_m2",
                "standard_name": "total_area_of_mangroves",
                "title": "Mangrove extent",
                "units": "m<sup>2</sup>"
            })
        );
    }

    #[test]
    fn test_null_slot_serialises_as_null() {
        let value = serde_json::to_value(area("toc_tco2e", vec![None])).unwrap();
        assert_eq!(value["values"], json!([null]));
    }

    #[test]
    fn test_length_extras() {
        let mut result = MetricResult::new(
            Props::new("length_mangrove_m", "length_of_coast_with_mangrove_cover", "Length of coast with mangroves", "m"),
            vec![10.0],
            vec![parse_timestamp("2016-01-01").unwrap()],
            &AnalysisParams::default(),
        );
        result.buffer_distance_m = Some(200.0);
        result.has_holes = Some(vec![false, true]);

        let value = serde_json::to_value(AnalysisResult::Length(result)).unwrap();
        assert_eq!(value["hasHoles"], json!([0, 1]));
        assert_eq!(value["buffer_distance_m"], json!(200.0));
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut map = ResultMap::new();
        map.insert(area("area_mangrove_m2", vec![Some(1.0)])).unwrap();
        let err = map.insert(area("area_mangrove_m2", vec![Some(2.0)])).unwrap_err();
        assert!(matches!(err, AtlasError::DuplicateResult(name) if name == "area_mangrove_m2"));
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let mut a = ResultMap::new();
        a.insert(area("x", vec![])).unwrap();

        let mut b = ResultMap::new();
        b.insert(area("y", vec![])).unwrap();
        b.insert(area("x", vec![])).unwrap();

        assert!(a.merge(b).is_err());
        assert_eq!(a.len(), 1);
        assert!(!a.contains("y"));
    }

    #[test]
    fn test_map_serialises_keyed_by_short_name() {
        let mut map = ResultMap::new();
        map.insert(area("b", vec![Some(1.0)])).unwrap();
        map.insert(area("a", vec![Some(2.0)])).unwrap();

        let value = serde_json::to_value(&map).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
