// Sentinel Server - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for Hydro Sentinel.
//!
//! Gauges mirror the latest dashboard view; counters accumulate processed
//! snapshots and alert transitions.

use hydro_sentinel::{AlertEvent, DashboardView, FeedHealth};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================
    // Readings
    // ============================================================

    /// Flow rate in L/min.
    pub static ref FLOW_RATE_LPM: Gauge = register_gauge!(
        "sentinel_flow_rate_lpm",
        "Current flow rate in litres per minute"
    ).unwrap();

    /// Total dissolved solids in ppm.
    pub static ref TDS_PPM: Gauge = register_gauge!(
        "sentinel_tds_ppm",
        "Current total dissolved solids in ppm"
    ).unwrap();

    /// Cumulative volume in mL.
    pub static ref VOLUME_ML: Gauge = register_gauge!(
        "sentinel_volume_ml",
        "Current volume reading in millilitres"
    ).unwrap();

    /// Line pressure in PSI.
    pub static ref PRESSURE_PSI: Gauge = register_gauge!(
        "sentinel_pressure_psi",
        "Current line pressure in PSI"
    ).unwrap();

    /// Conductivity derived from TDS.
    pub static ref CONDUCTIVITY_US_CM: Gauge = register_gauge!(
        "sentinel_conductivity_us_cm",
        "Conductivity estimated from TDS in microsiemens per centimetre"
    ).unwrap();

    // ============================================================
    // Alerts
    // ============================================================

    /// Alert activity (1 = active), labeled by alert id.
    pub static ref ALERT_ACTIVE: GaugeVec = register_gauge_vec!(
        "sentinel_alert_active",
        "Alert activity (1=active, 0=inactive)",
        &["alert"]
    ).unwrap();

    /// Number of active alerts.
    pub static ref ACTIVE_ALERTS: Gauge = register_gauge!(
        "sentinel_active_alerts",
        "Number of currently active alerts"
    ).unwrap();

    /// Alert transitions, labeled by alert id and direction.
    pub static ref ALERT_TRANSITIONS_TOTAL: CounterVec = register_counter_vec!(
        "sentinel_alert_transitions_total",
        "Total alert transitions",
        &["alert", "transition"]
    ).unwrap();

    /// Feed health (0 = awaiting, 1 = live, 2 = stale).
    pub static ref FEED_HEALTH: Gauge = register_gauge!(
        "sentinel_feed_health",
        "Feed health (0=awaiting, 1=live, 2=stale)"
    ).unwrap();

    // ============================================================
    // Server Metrics
    // ============================================================

    /// Total snapshots processed by the engine.
    pub static ref SNAPSHOTS_PROCESSED_TOTAL: Counter = register_counter!(
        "sentinel_snapshots_processed_total",
        "Total snapshots processed by the engine"
    ).unwrap();

    /// Current replay position (sample index).
    pub static ref REPLAY_POSITION: Gauge = register_gauge!(
        "sentinel_replay_position",
        "Current replay position (sample index)"
    ).unwrap();

    /// Total samples in the replay feed.
    pub static ref REPLAY_TOTAL_SAMPLES: Gauge = register_gauge!(
        "sentinel_replay_total_samples",
        "Total samples in the replay feed"
    ).unwrap();

    /// Replay speed multiplier.
    pub static ref REPLAY_SPEED: Gauge = register_gauge!(
        "sentinel_replay_speed",
        "Replay speed multiplier"
    ).unwrap();
}

/// Numeric encoding of feed health.
pub fn feed_health_value(health: FeedHealth) -> f64 {
    match health {
        FeedHealth::Awaiting => 0.0,
        FeedHealth::Live => 1.0,
        FeedHealth::Stale => 2.0,
    }
}

/// Update reading and alert gauges from a freshly processed view.
pub fn update_from_view(view: &DashboardView) {
    let readings = &view.readings;
    FLOW_RATE_LPM.set(readings.flow_rate.value.unwrap_or(0.0));
    TDS_PPM.set(readings.tds.value.unwrap_or(0.0));
    VOLUME_ML.set(readings.volume.value.unwrap_or(0.0));
    PRESSURE_PSI.set(readings.pressure.value.unwrap_or(0.0));
    CONDUCTIVITY_US_CM.set(readings.conductivity.value.unwrap_or(0.0));

    for alert in &view.alerts {
        ALERT_ACTIVE
            .with_label_values(&[alert.id.as_str()])
            .set(if alert.is_active { 1.0 } else { 0.0 });
    }
    ACTIVE_ALERTS.set(view.active_alerts as f64);
    FEED_HEALTH.set(feed_health_value(view.feed));

    for event in &view.events {
        record_alert_event(event);
    }

    SNAPSHOTS_PROCESSED_TOTAL.inc();
}

/// Increment the transition counter for one event.
pub fn record_alert_event(event: &AlertEvent) {
    ALERT_TRANSITIONS_TOTAL
        .with_label_values(&[event.kind.id(), event.transition.as_str()])
        .inc();
}

/// Set feed health at scrape time.
pub fn update_feed_health(health: FeedHealth) {
    FEED_HEALTH.set(feed_health_value(health));
}

/// Update replay position metrics.
pub fn update_replay_metrics(position: usize, total: usize, speed: f64) {
    REPLAY_POSITION.set(position as f64);
    REPLAY_TOTAL_SAMPLES.set(total as f64);
    REPLAY_SPEED.set(speed);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
