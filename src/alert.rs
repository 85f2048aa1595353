// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert state aggregation.
//!
//! The aggregator turns the current latch states into one [`AlertState`]
//! per known alert type. It is recomputed in full on every snapshot and
//! holds no history of its own.

use crate::config::ConditionConfig;
use crate::latch::{Condition, ConditionMonitor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Known alert types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Lead or other heavy metal detected. No live detector exists.
    HeavyMetal,
    /// TDS above the anomaly limit.
    TdsAnomaly,
    /// Flow rate inside the leak band.
    Leak,
}

impl AlertKind {
    /// All alert types, in display order.
    pub const ALL: [AlertKind; 3] = [AlertKind::HeavyMetal, AlertKind::TdsAnomaly, AlertKind::Leak];

    pub fn id(&self) -> &'static str {
        match self {
            AlertKind::HeavyMetal => "heavy_metal",
            AlertKind::TdsAnomaly => "tds_anomaly",
            AlertKind::Leak => "leak",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::HeavyMetal => "HEAVY METAL DETECTED",
            AlertKind::TdsAnomaly => "TDS ANOMALY",
            AlertKind::Leak => "LEAK DETECTED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::HeavyMetal => {
                "Lead concentration approaching EPA limit - immediate investigation recommended"
            }
            AlertKind::TdsAnomaly => {
                "TDS level exceeded safe threshold - water quality degradation detected"
            }
            AlertKind::Leak => "Flow rate inside the leak band - possible leak",
        }
    }

    /// Display text with the reading band taken from the detecting condition.
    pub fn message_for(&self, condition: &Condition) -> String {
        match self {
            AlertKind::Leak => format!(
                "Flow rate {} L/min detected - possible leak",
                condition.describe()
            ),
            AlertKind::HeavyMetal | AlertKind::TdsAnomaly => self.message().to_string(),
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertKind::HeavyMetal | AlertKind::TdsAnomaly => AlertSeverity::Warning,
            AlertKind::Leak => AlertSeverity::Danger,
        }
    }

    pub fn detector(&self) -> Detector {
        match self {
            AlertKind::HeavyMetal => Detector::Unavailable,
            AlertKind::TdsAnomaly | AlertKind::Leak => Detector::Latch,
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Danger,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Danger => "danger",
        }
    }
}

/// How an alert type is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    /// Driven by a condition latch.
    Latch,
    /// Declared but no sensor field or rule feeds it; always inactive.
    Unavailable,
}

/// Current state of one alert type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub is_active: bool,
    pub location: String,
    /// Start of the current episode; `None` while inactive.
    pub triggered_at: Option<DateTime<Utc>>,
    /// Reading the detector evaluated this cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub detector: Detector,
}

impl AlertState {
    fn inactive(kind: AlertKind, location: &str, message: String) -> Self {
        Self {
            id: kind.id().to_string(),
            kind,
            title: kind.title().to_string(),
            message,
            severity: kind.severity(),
            is_active: false,
            location: location.to_string(),
            triggered_at: None,
            value: None,
            detector: kind.detector(),
        }
    }

    fn from_monitor(kind: AlertKind, monitor: &ConditionMonitor, location: &str) -> Self {
        let latch = monitor.latch();
        Self {
            is_active: latch.is_active(),
            triggered_at: latch.first_triggered_at(),
            value: monitor.last_value(),
            ..Self::inactive(kind, location, kind.message_for(monitor.condition()))
        }
    }
}

/// Builds the alert list from latch states.
#[derive(Debug, Clone)]
pub struct AlertAggregator {
    location: String,
    conditions: ConditionConfig,
}

impl AlertAggregator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            conditions: ConditionConfig::default(),
        }
    }

    /// Use the configured conditions for alert text.
    pub fn with_conditions(mut self, conditions: ConditionConfig) -> Self {
        self.conditions = conditions;
        self
    }

    /// One state per alert type, in [`AlertKind::ALL`] order.
    pub fn aggregate(
        &self,
        tds_anomaly: &ConditionMonitor,
        leak: &ConditionMonitor,
    ) -> Vec<AlertState> {
        AlertKind::ALL
            .iter()
            .map(|&kind| match kind {
                AlertKind::HeavyMetal => {
                    AlertState::inactive(kind, &self.location, kind.message().to_string())
                }
                AlertKind::TdsAnomaly => AlertState::from_monitor(kind, tds_anomaly, &self.location),
                AlertKind::Leak => AlertState::from_monitor(kind, leak, &self.location),
            })
            .collect()
    }

    /// Alert list before any snapshot has arrived.
    pub fn idle(&self) -> Vec<AlertState> {
        AlertKind::ALL
            .iter()
            .map(|&kind| AlertState::inactive(kind, &self.location, self.message(kind)))
            .collect()
    }

    fn message(&self, kind: AlertKind) -> String {
        match kind {
            AlertKind::Leak => kind.message_for(&self.conditions.leak),
            AlertKind::TdsAnomaly => kind.message_for(&self.conditions.tds_anomaly),
            AlertKind::HeavyMetal => kind.message().to_string(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}
