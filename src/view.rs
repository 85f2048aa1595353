// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DashboardView - immutable display structure for the presentation layer.

use crate::alert::{AlertKind, AlertState};
use crate::classifier::Classifications;
use crate::event::AlertEvent;
use crate::health::FeedHealth;
use crate::metrics::DerivedMetrics;
use crate::snapshot::SensorSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Version of the view format.
pub const VIEW_VERSION: &str = "0.1.0";

/// Placeholder status shown before the first snapshot.
pub const LOADING: &str = "LOADING";

/// A metric value with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// `None` until a snapshot arrives.
    pub value: Option<f64>,
    pub unit: String,
}

impl Reading {
    fn new(value: Option<f64>, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

/// All displayed readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub flow_rate: Reading,
    pub tds: Reading,
    pub volume: Reading,
    pub pressure: Reading,
    pub conductivity: Reading,
}

impl Readings {
    fn from_frame(latest: Option<Latest<'_>>) -> Self {
        let snapshot = latest.map(|l| l.snapshot);
        let derived = latest.map(|l| l.derived);
        Self {
            flow_rate: Reading::new(snapshot.map(|s| s.flow_rate_lpm), "L/min"),
            tds: Reading::new(snapshot.map(|s| s.tds_ppm), "ppm"),
            volume: Reading::new(snapshot.map(|s| s.volume_ml), "mL"),
            pressure: Reading::new(snapshot.map(|s| s.pressure_psi), "PSI"),
            conductivity: Reading::new(derived.map(|d| d.conductivity_us_cm), "µS/cm"),
        }
    }
}

/// Borrowed results of the latest processed snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Latest<'a> {
    pub snapshot: &'a SensorSnapshot,
    pub derived: &'a DerivedMetrics,
    pub classifications: &'a Classifications,
}

/// Complete dashboard state for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    /// Format version.
    pub version: String,
    /// Install location.
    pub location: String,
    /// When the view was produced.
    pub generated_at: DateTime<Utc>,
    /// When the displayed snapshot was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    /// Feed staleness indicator.
    pub feed: FeedHealth,
    /// Current readings with units.
    pub readings: Readings,
    /// Current status labels.
    pub status: Classifications,
    /// One entry per alert type.
    pub alerts: Vec<AlertState>,
    /// Number of active alerts.
    pub active_alerts: usize,
    /// Alert transitions of the cycle that produced this view.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<AlertEvent>,
}

impl DashboardView {
    /// Recompute feed health for a later `now`; everything else is kept.
    pub fn refreshed(&self, now: DateTime<Utc>, stale_after: Duration) -> Self {
        Self {
            generated_at: now,
            feed: FeedHealth::assess(self.observed_at, now, stale_after),
            ..self.clone()
        }
    }

    /// Whether any snapshot has been displayed yet.
    pub fn is_loading(&self) -> bool {
        self.observed_at.is_none()
    }

    /// State of one alert type.
    pub fn alert(&self, kind: AlertKind) -> Option<&AlertState> {
        self.alerts.iter().find(|a| a.kind == kind)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn loading_status() -> Classifications {
    Classifications {
        water_quality: LOADING.to_string(),
        conductivity: LOADING.to_string(),
        flow: LOADING.to_string(),
        contamination_risk: LOADING.to_string(),
        metal_probability: LOADING.to_string(),
    }
}

/// Maps engine state to a [`DashboardView`].
#[derive(Debug, Clone)]
pub struct ViewProjector {
    location: String,
    stale_after: Duration,
}

impl ViewProjector {
    pub fn new(location: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            location: location.into(),
            stale_after,
        }
    }

    /// Build the view. Absent data renders as [`LOADING`].
    pub fn project(
        &self,
        latest: Option<Latest<'_>>,
        alerts: &[AlertState],
        events: &[AlertEvent],
        now: DateTime<Utc>,
    ) -> DashboardView {
        let observed_at = latest.map(|l| l.snapshot.observed_at);
        DashboardView {
            version: VIEW_VERSION.to_string(),
            location: self.location.clone(),
            generated_at: now,
            observed_at,
            feed: FeedHealth::assess(observed_at, now, self.stale_after),
            readings: Readings::from_frame(latest),
            status: latest
                .map(|l| l.classifications.clone())
                .unwrap_or_else(loading_status),
            alerts: alerts.to_vec(),
            active_alerts: alerts.iter().filter(|a| a.is_active).count(),
            events: events.to_vec(),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}
