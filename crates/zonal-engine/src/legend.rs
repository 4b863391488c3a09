//! Legend groups published alongside the mangrove layers.

use mangrove_common::{AtlasError, AtlasResult, HexColor};
use serde::{Deserialize, Serialize};

/// Coarse display groups of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub group_lower: Vec<f64>,
    pub group_upper: Vec<f64>,
    pub group_colors: Vec<HexColor>,
    #[serde(default)]
    pub group_labels: Vec<String>,
}

impl Legend {
    /// Build a legend; every vector must have one entry per group.
    pub fn new(
        group_lower: Vec<f64>,
        group_upper: Vec<f64>,
        colors: &[&str],
        group_labels: Vec<String>,
    ) -> AtlasResult<Self> {
        let group_colors = colors
            .iter()
            .map(|c| HexColor::parse(c))
            .collect::<AtlasResult<Vec<_>>>()?;
        let legend = Self {
            group_lower,
            group_upper,
            group_colors,
            group_labels,
        };
        legend.validate()?;
        Ok(legend)
    }

    pub fn validate(&self) -> AtlasResult<()> {
        let n = self.group_lower.len();
        if n == 0 {
            return Err(AtlasError::invalid_parameter("legend", "legend has no groups"));
        }
        if self.group_upper.len() != n
            || self.group_colors.len() != n
            || (!self.group_labels.is_empty() && self.group_labels.len() != n)
        {
            return Err(AtlasError::invalid_parameter(
                "legend",
                "group_lower, group_upper, group_colors and group_labels must have equal lengths",
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.group_lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_lower.is_empty()
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Legend the atlas publishes for a dataset key, if it has one.
pub fn builtin_legend(key: &str) -> Option<Legend> {
    let legend = match key {
        "mangrove-extent" => Legend::new(vec![0.0], vec![1.0], &["#01C4BE"], labels(&["Presence"])),
        "mangrove-gain" => Legend::new(vec![0.0], vec![1.0], &["#a6cb10"], labels(&["Gain"])),
        "mangrove-loss" => Legend::new(vec![0.0], vec![1.0], &["#eb6240"], labels(&["Loss"])),
        "mangrove-agb" => Legend::new(
            vec![0.0, 250.0, 500.0, 750.0, 1000.0],
            vec![250.0, 500.0, 750.0, 1000.0, 1250.0],
            &["#EAF19D", "#B8E98E", "#1B97C1", "#1C52A3", "#13267F"],
            Vec::new(),
        ),
        "mangrove-hmax" => Legend::new(
            vec![0.0, 13.0, 26.0, 39.0, 52.0],
            vec![13.0, 26.0, 39.0, 52.0, 65.0],
            &["#C9BB42", "#8BA205", "#428710", "#0A6624", "#103C1F"],
            Vec::new(),
        ),
        "mangrove-toc" => Legend::new(
            vec![0.0, 700.0, 1400.0, 2100.0, 2800.0],
            vec![700.0, 1400.0, 2100.0, 2800.0, 3500.0],
            &["#eeb66b", "#e68518", "#b84e17", "#933a06", "#5c4a3d"],
            Vec::new(),
        ),
        _ => return None,
    };
    legend.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_legends_are_valid() {
        for key in [
            "mangrove-extent",
            "mangrove-gain",
            "mangrove-loss",
            "mangrove-agb",
            "mangrove-hmax",
            "mangrove-toc",
        ] {
            let legend = builtin_legend(key).unwrap_or_else(|| panic!("missing legend {}", key));
            assert!(legend.validate().is_ok());
        }
    }

    #[test]
    fn test_unknown_key() {
        assert!(builtin_legend("mangrove-hba").is_none());
    }

    #[test]
    fn test_extent_legend() {
        let legend = builtin_legend("mangrove-extent").unwrap();
        assert_eq!(legend.group_colors[0].as_str(), "#01C4BE");
        assert_eq!(legend.group_labels, vec!["Presence"]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        assert!(Legend::new(vec![0.0, 1.0], vec![1.0], &["#000"], Vec::new()).is_err());
    }
}
