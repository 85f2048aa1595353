// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Threshold classification module
//!
//! Maps a reading to a discrete status label through an ordered table of
//! bands. Bands are evaluated in ascending order and the first one the value
//! fits under wins; a value that fits under none (including NaN) gets the
//! table's terminal label, so classification is total.

use crate::error::ConfigError;
use crate::metrics::DerivedMetrics;
use crate::snapshot::SensorSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Water is within the safe range
pub const SAFE: &str = "SAFE";
/// Reading needs attention
pub const WARNING: &str = "WARNING";
/// Reading is unsafe
pub const DANGER: &str = "DANGER";
/// Flow is in a normal regime
pub const NORMAL: &str = "NORMAL";

/// One band of a threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Upper bound of the band
    pub upper: f64,
    /// `true` for `value <= upper`, `false` for `value < upper`
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
    /// Label assigned to values in this band
    pub label: String,
}

fn default_inclusive() -> bool {
    true
}

impl Band {
    fn contains(&self, value: f64) -> bool {
        if self.inclusive {
            value <= self.upper
        } else {
            value < self.upper
        }
    }
}

/// Ordered set of `(upper bound, label)` bands plus a terminal label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    /// Bands in ascending order of upper bound
    pub bands: Vec<Band>,
    /// Label for values above every band
    pub terminal: String,
}

impl ThresholdTable {
    /// Create a table with no bands yet
    pub fn new(terminal: impl Into<String>) -> Self {
        Self {
            bands: Vec::new(),
            terminal: terminal.into(),
        }
    }

    /// Builder: add an inclusive band (`value <= upper`)
    pub fn at_most(mut self, upper: f64, label: impl Into<String>) -> Self {
        self.bands.push(Band {
            upper,
            inclusive: true,
            label: label.into(),
        });
        self
    }

    /// Builder: add an exclusive band (`value < upper`)
    pub fn below(mut self, upper: f64, label: impl Into<String>) -> Self {
        self.bands.push(Band {
            upper,
            inclusive: false,
            label: label.into(),
        });
        self
    }

    /// Classify a value
    pub fn classify(&self, value: f64) -> &str {
        self.bands
            .iter()
            .find(|band| band.contains(value))
            .map(|band| band.label.as_str())
            .unwrap_or(self.terminal.as_str())
    }

    /// Check bounds are finite and strictly ascending and labels non-blank
    pub fn validate(&self, table: &str) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::EmptyTable {
                table: table.to_string(),
            });
        }

        let mut previous: Option<f64> = None;
        for (index, band) in self.bands.iter().enumerate() {
            if !band.upper.is_finite() {
                return Err(ConfigError::NonFiniteBound {
                    table: table.to_string(),
                    index,
                });
            }
            if band.label.trim().is_empty() {
                return Err(ConfigError::BlankLabel {
                    table: table.to_string(),
                    index,
                });
            }
            if let Some(prev) = previous {
                if band.upper <= prev {
                    return Err(ConfigError::UnorderedBounds {
                        table: table.to_string(),
                        index,
                        bound: band.upper,
                    });
                }
            }
            previous = Some(band.upper);
        }

        if self.terminal.trim().is_empty() {
            return Err(ConfigError::BlankLabel {
                table: table.to_string(),
                index: self.bands.len(),
            });
        }

        Ok(())
    }
}

/// Named classification scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Water quality from TDS
    Tds,
    /// Water quality from conductivity
    Conductivity,
    /// System monitor status from flow rate
    Flow,
    /// Metal contamination risk from TDS
    ContaminationRisk,
    /// Heavy-metal probability from conductivity
    MetalProbability,
}

impl Scale {
    /// All scales, in display order
    pub const ALL: [Scale; 5] = [
        Scale::Tds,
        Scale::Conductivity,
        Scale::Flow,
        Scale::ContaminationRisk,
        Scale::MetalProbability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Tds => "tds",
            Scale::Conductivity => "conductivity",
            Scale::Flow => "flow",
            Scale::ContaminationRisk => "contamination_risk",
            Scale::MetalProbability => "metal_probability",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scale::ALL
            .iter()
            .copied()
            .find(|scale| scale.as_str() == s)
            .ok_or_else(|| format!("unknown scale: {}", s))
    }
}

/// One threshold table per scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub tds: ThresholdTable,
    pub conductivity: ThresholdTable,
    pub flow: ThresholdTable,
    pub contamination_risk: ThresholdTable,
    pub metal_probability: ThresholdTable,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            tds: ThresholdTable::new(DANGER)
                .at_most(500.0, SAFE)
                .at_most(1000.0, WARNING),
            conductivity: ThresholdTable::new(DANGER)
                .at_most(750.0, SAFE)
                .at_most(1500.0, WARNING),
            // Zero flow is idle; a trickle up to 0.5 L/min is suspicious
            flow: ThresholdTable::new(NORMAL)
                .at_most(0.0, NORMAL)
                .at_most(0.5, WARNING),
            contamination_risk: ThresholdTable::new("Very High")
                .below(500.0, "Very Low")
                .below(1000.0, "Moderate")
                .below(2000.0, "High"),
            metal_probability: ThresholdTable::new("> 80%")
                .below(750.0, "< 5%")
                .below(1500.0, "10–20%")
                .below(3000.0, "40–60%"),
        }
    }
}

impl ThresholdSet {
    /// Table for a scale
    pub fn table(&self, scale: Scale) -> &ThresholdTable {
        match scale {
            Scale::Tds => &self.tds,
            Scale::Conductivity => &self.conductivity,
            Scale::Flow => &self.flow,
            Scale::ContaminationRisk => &self.contamination_risk,
            Scale::MetalProbability => &self.metal_probability,
        }
    }

    /// Validate every table
    pub fn validate(&self) -> Result<(), ConfigError> {
        for scale in Scale::ALL {
            self.table(scale).validate(scale.as_str())?;
        }
        Ok(())
    }
}

/// Status labels for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifications {
    pub water_quality: String,
    pub conductivity: String,
    pub flow: String,
    pub contamination_risk: String,
    pub metal_probability: String,
}

/// Classifier over a fixed set of threshold tables
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    tables: ThresholdSet,
}

impl Classifier {
    /// Create a classifier with the given tables
    pub fn new(tables: ThresholdSet) -> Self {
        Self { tables }
    }

    /// Classify a value on a scale
    pub fn classify(&self, scale: Scale, value: f64) -> &str {
        self.tables.table(scale).classify(value)
    }

    /// Classify by scale name; `None` for unknown names
    pub fn classify_named(&self, name: &str, value: f64) -> Option<&str> {
        let scale = name.parse::<Scale>().ok()?;
        Some(self.classify(scale, value))
    }

    /// Classify every scale for a snapshot
    pub fn classify_all(
        &self,
        snapshot: &SensorSnapshot,
        derived: &DerivedMetrics,
    ) -> Classifications {
        Classifications {
            water_quality: self.classify(Scale::Tds, snapshot.tds_ppm).to_string(),
            conductivity: self
                .classify(Scale::Conductivity, derived.conductivity_us_cm)
                .to_string(),
            flow: self.classify(Scale::Flow, snapshot.flow_rate_lpm).to_string(),
            contamination_risk: self
                .classify(Scale::ContaminationRisk, snapshot.tds_ppm)
                .to_string(),
            metal_probability: self
                .classify(Scale::MetalProbability, derived.conductivity_us_cm)
                .to_string(),
        }
    }

    /// Get current tables
    pub fn tables(&self) -> &ThresholdSet {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tds_boundaries_inclusive() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::Tds, 500.0), SAFE);
        assert_eq!(classifier.classify(Scale::Tds, 500.01), WARNING);
        assert_eq!(classifier.classify(Scale::Tds, 1000.0), WARNING);
        assert_eq!(classifier.classify(Scale::Tds, 1000.01), DANGER);
    }

    #[test]
    fn test_named_classification() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify_named("tds", 500.0), Some(SAFE));
        assert_eq!(classifier.classify_named("tds", 1000.01), Some(DANGER));
        assert_eq!(classifier.classify_named("turbidity", 1.0), None);
    }

    #[test]
    fn test_negative_and_zero_values_are_lowest_band() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::Tds, 0.0), SAFE);
        assert_eq!(classifier.classify(Scale::Tds, -20.0), SAFE);
    }

    #[test]
    fn test_nan_maps_to_terminal() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::Tds, f64::NAN), DANGER);
    }

    #[test]
    fn test_flow_status() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::Flow, 0.0), NORMAL);
        assert_eq!(classifier.classify(Scale::Flow, 0.05), WARNING);
        assert_eq!(classifier.classify(Scale::Flow, 0.5), WARNING);
        assert_eq!(classifier.classify(Scale::Flow, 0.51), NORMAL);
        assert_eq!(classifier.classify(Scale::Flow, 12.0), NORMAL);
    }

    #[test]
    fn test_exclusive_bands() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::ContaminationRisk, 499.9), "Very Low");
        assert_eq!(classifier.classify(Scale::ContaminationRisk, 500.0), "Moderate");
        assert_eq!(classifier.classify(Scale::ContaminationRisk, 2000.0), "Very High");
        assert_eq!(classifier.classify(Scale::MetalProbability, 750.0), "10–20%");
        assert_eq!(classifier.classify(Scale::MetalProbability, 2999.0), "40–60%");
        assert_eq!(classifier.classify(Scale::MetalProbability, 3000.0), "> 80%");
    }

    #[test]
    fn test_conductivity_scale() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Scale::Conductivity, 750.0), SAFE);
        assert_eq!(classifier.classify(Scale::Conductivity, 1500.0), WARNING);
        assert_eq!(classifier.classify(Scale::Conductivity, 1500.5), DANGER);
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let table = ThresholdTable::new(DANGER)
            .at_most(1000.0, WARNING)
            .at_most(500.0, SAFE);
        let err = table.validate("tds").unwrap_err();
        assert!(matches!(err, ConfigError::UnorderedBounds { index: 1, .. }));
    }

    #[test]
    fn test_validate_rejects_empty_and_blank() {
        let empty = ThresholdTable::new(DANGER);
        assert!(matches!(
            empty.validate("tds"),
            Err(ConfigError::EmptyTable { .. })
        ));

        let blank = ThresholdTable::new(DANGER).at_most(1.0, "  ");
        assert!(matches!(
            blank.validate("tds"),
            Err(ConfigError::BlankLabel { index: 0, .. })
        ));

        let infinite = ThresholdTable::new(DANGER).at_most(f64::INFINITY, SAFE);
        assert!(matches!(
            infinite.validate("tds"),
            Err(ConfigError::NonFiniteBound { .. })
        ));
    }

    #[test]
    fn test_default_tables_are_valid() {
        assert!(ThresholdSet::default().validate().is_ok());
    }

    #[test]
    fn test_scale_parse_roundtrip() {
        for scale in Scale::ALL {
            assert_eq!(scale.as_str().parse::<Scale>(), Ok(scale));
        }
    }

    #[test]
    fn test_band_inclusive_defaults_on_deserialize() {
        let band: Band = serde_json::from_str(r#"{"upper": 5.0, "label": "SAFE"}"#).unwrap();
        assert!(band.inclusive);
    }
}
