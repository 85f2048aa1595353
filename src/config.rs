// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.

use crate::classifier::ThresholdSet;
use crate::error::ConfigError;
use crate::latch::Condition;
use crate::snapshot::FieldMap;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default install location stamped on alerts.
pub const DEFAULT_LOCATION: &str = "bathroom";

/// Master configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Install location reported on every alert.
    pub location: String,

    /// Raw feed key names.
    pub fields: FieldMap,

    /// Threshold tables per metric.
    pub thresholds: ThresholdSet,

    /// Latched alert conditions.
    pub conditions: ConditionConfig,

    /// Feed health settings.
    pub feed: FeedConfig,

    /// Alert event history settings.
    pub history: HistoryConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION.to_string(),
            fields: FieldMap::default(),
            thresholds: ThresholdSet::default(),
            conditions: ConditionConfig::default(),
            feed: FeedConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every table and condition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.conditions.leak.validate("leak")?;
        self.conditions.tds_anomaly.validate("tds_anomaly")?;
        if self.history.capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        Ok(())
    }

    /// Builder: set location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder: set the staleness window in seconds.
    pub fn with_stale_after_secs(mut self, secs: u64) -> Self {
        self.feed.stale_after_secs = secs;
        self
    }
}

/// Conditions driving the latched alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// Flow band treated as a leak (L/min).
    pub leak: Condition,
    /// TDS level treated as an anomaly (ppm).
    pub tds_anomaly: Condition,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            leak: Condition::InRange { min: 0.1, max: 0.5 },
            tds_anomaly: Condition::Above { limit: 100.0 },
        }
    }
}

/// Feed health configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Seconds without a snapshot before the feed is reported stale.
    pub stale_after_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 60,
        }
    }
}

impl FeedConfig {
    pub fn stale_after(&self) -> Duration {
        let secs = self.stale_after_secs.min(u64::from(u32::MAX));
        Duration::seconds(secs as i64)
    }
}

/// Alert history configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained alert events.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SentinelConfig::default();
        assert_eq!(config.location, "bathroom");
        assert_eq!(config.feed.stale_after_secs, 60);
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.conditions.leak, Condition::InRange { min: 0.1, max: 0.5 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SentinelConfig::from_json(r#"{"location": "kitchen"}"#).unwrap();
        assert_eq!(config.location, "kitchen");
        assert_eq!(config.fields.tds, "TDS_ppm");
        assert_eq!(config.thresholds, ThresholdSet::default());
    }

    #[test]
    fn test_override_condition() {
        let json = r#"{"conditions": {"tds_anomaly": {"kind": "above", "limit": 250.0}}}"#;
        let config = SentinelConfig::from_json(json).unwrap();
        assert_eq!(config.conditions.tds_anomaly, Condition::Above { limit: 250.0 });
        assert_eq!(config.conditions.leak, Condition::InRange { min: 0.1, max: 0.5 });
    }

    #[test]
    fn test_invalid_condition_rejected() {
        let json = r#"{"conditions": {"leak": {"kind": "in_range", "min": 1.0, "max": 0.5}}}"#;
        let err = SentinelConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCondition { .. }));
    }

    #[test]
    fn test_zero_history_rejected() {
        let err = SentinelConfig::from_json(r#"{"history": {"capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroHistoryCapacity));
    }

    #[test]
    fn test_malformed_json() {
        let err = SentinelConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let config = SentinelConfig::default()
            .with_location("laundry")
            .with_stale_after_secs(15);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_pretty().unwrap().as_bytes())
            .unwrap();

        let loaded = SentinelConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.feed.stale_after(), Duration::seconds(15));
    }

    #[test]
    fn test_missing_file() {
        let err = SentinelConfig::from_json_file("/nonexistent/sentinel.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
