// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! SentinelEngine - per-snapshot orchestration.
//!
//! Each snapshot is one unit of work: normalize, derive, classify, update
//! latches, aggregate, project. The engine owns every latch and the current
//! alert list; callers only ever receive copies.

use crate::alert::{AlertAggregator, AlertKind, AlertState};
use crate::classifier::{Classifications, Classifier};
use crate::config::SentinelConfig;
use crate::error::{ConfigError, SubscribeError};
use crate::event::{AlertEvent, AlertLog, AlertTransition};
use crate::latch::{ConditionMonitor, LatchTransition};
use crate::metrics::DerivedMetrics;
use crate::snapshot::{RawFields, SensorSnapshot};
use crate::stream::{SnapshotSource, Subscription};
use crate::view::{DashboardView, Latest, ViewProjector};
use chrono::{DateTime, Utc};
use log::{info, warn};

/// Results of the most recent snapshot.
#[derive(Debug, Clone)]
struct Frame {
    snapshot: SensorSnapshot,
    derived: DerivedMetrics,
    classifications: Classifications,
}

impl Frame {
    fn latest(&self) -> Latest<'_> {
        Latest {
            snapshot: &self.snapshot,
            derived: &self.derived,
            classifications: &self.classifications,
        }
    }
}

/// Why [`SentinelEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every publisher went away.
    Closed,
    /// A cancel handle stopped the subscription.
    Cancelled,
}

/// Totals for one [`SentinelEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub raised: usize,
    pub resolved: usize,
    pub ended: RunEnd,
}

/// Main engine.
pub struct SentinelEngine {
    config: SentinelConfig,
    classifier: Classifier,
    tds_anomaly: ConditionMonitor,
    leak: ConditionMonitor,
    aggregator: AlertAggregator,
    projector: ViewProjector,
    history: AlertLog,

    /// Last processed snapshot.
    latest: Option<Frame>,
    /// Current alert list.
    alerts: Vec<AlertState>,
    /// Transitions of the last cycle.
    last_events: Vec<AlertEvent>,
    /// Total snapshots processed.
    snapshot_count: u64,
}

impl SentinelEngine {
    /// Create an engine after validating the configuration.
    pub fn new(config: SentinelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SentinelConfig) -> Self {
        let aggregator = AlertAggregator::new(config.location.clone())
            .with_conditions(config.conditions.clone());
        Self {
            classifier: Classifier::new(config.thresholds.clone()),
            tds_anomaly: ConditionMonitor::new("tds_anomaly", config.conditions.tds_anomaly),
            leak: ConditionMonitor::new("leak", config.conditions.leak),
            alerts: aggregator.idle(),
            projector: ViewProjector::new(config.location.clone(), config.feed.stale_after()),
            history: AlertLog::new(config.history.capacity),
            aggregator,
            config,
            latest: None,
            last_events: Vec::new(),
            snapshot_count: 0,
        }
    }

    /// Process one raw snapshot received now.
    pub fn process(&mut self, raw: &RawFields) -> DashboardView {
        self.process_at(raw, Utc::now())
    }

    /// Process one raw snapshot received at `now`.
    pub fn process_at(&mut self, raw: &RawFields, now: DateTime<Utc>) -> DashboardView {
        if let Some(previous) = &self.latest {
            if now < previous.snapshot.observed_at {
                warn!(
                    "snapshot received at {} is earlier than previous {}; processing as-is",
                    now, previous.snapshot.observed_at
                );
            }
        }

        let snapshot = SensorSnapshot::normalize(raw, &self.config.fields, now);
        let derived = DerivedMetrics::derive(&snapshot);
        let classifications = self.classifier.classify_all(&snapshot, &derived);

        let tds_transition = self.tds_anomaly.observe(snapshot.tds_ppm, now);
        let leak_transition = self.leak.observe(snapshot.flow_rate_lpm, now);

        let mut events = Vec::new();
        for (kind, transition, value) in [
            (AlertKind::TdsAnomaly, tds_transition, snapshot.tds_ppm),
            (AlertKind::Leak, leak_transition, snapshot.flow_rate_lpm),
        ] {
            if let Some(event) = transition_event(kind, transition, value) {
                match event.transition {
                    AlertTransition::Raised => info!("{} raised (value {})", kind.title(), value),
                    AlertTransition::Resolved => {
                        info!("{} resolved (value {})", kind.title(), value)
                    }
                }
                self.history.push(event.clone());
                events.push(event);
            }
        }

        self.alerts = self.aggregator.aggregate(&self.tds_anomaly, &self.leak);
        self.latest = Some(Frame {
            snapshot,
            derived,
            classifications,
        });
        self.last_events = events;
        self.snapshot_count += 1;

        self.view_at(now)
    }

    /// Current view, feed health evaluated now.
    pub fn view(&self) -> DashboardView {
        self.view_at(Utc::now())
    }

    /// Current view, feed health evaluated at `now`.
    pub fn view_at(&self, now: DateTime<Utc>) -> DashboardView {
        self.projector.project(
            self.latest.as_ref().map(Frame::latest),
            &self.alerts,
            &self.last_events,
            now,
        )
    }

    /// Open the inbound stream. Failure is returned, never swallowed.
    pub fn attach<S: SnapshotSource + ?Sized>(
        source: &mut S,
    ) -> Result<Subscription, SubscribeError> {
        source.subscribe().map_err(|e| {
            warn!("failed to subscribe to snapshot feed: {}", e);
            e
        })
    }

    /// Process snapshots in arrival order until the feed ends.
    pub fn run<F>(&mut self, subscription: &Subscription, on_view: F) -> RunSummary
    where
        F: FnMut(&DashboardView),
    {
        self.run_with_clock(subscription, Utc::now, on_view)
    }

    /// [`run`](Self::run) with an injected receive clock.
    pub fn run_with_clock<C, F>(
        &mut self,
        subscription: &Subscription,
        mut clock: C,
        mut on_view: F,
    ) -> RunSummary
    where
        C: FnMut() -> DateTime<Utc>,
        F: FnMut(&DashboardView),
    {
        let mut processed = 0;
        let mut raised = 0;
        let mut resolved = 0;

        while let Some(raw) = subscription.next() {
            let view = self.process_at(&raw, clock());
            for event in &view.events {
                match event.transition {
                    AlertTransition::Raised => raised += 1,
                    AlertTransition::Resolved => resolved += 1,
                }
            }
            processed += 1;
            on_view(&view);
        }

        let ended = if subscription.is_cancelled() {
            RunEnd::Cancelled
        } else {
            RunEnd::Closed
        };
        info!(
            "feed ended ({:?}) after {} snapshots, {} raised, {} resolved",
            ended, processed, raised, resolved
        );

        RunSummary {
            processed,
            raised,
            resolved,
            ended,
        }
    }

    /// Current alert list.
    pub fn alerts(&self) -> &[AlertState] {
        &self.alerts
    }

    /// Number of active alerts.
    pub fn active_alert_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.is_active).count()
    }

    /// Alert event history.
    pub fn history(&self) -> &AlertLog {
        &self.history
    }

    /// Last normalized snapshot.
    pub fn latest_snapshot(&self) -> Option<&SensorSnapshot> {
        self.latest.as_ref().map(|f| &f.snapshot)
    }

    /// Get total snapshots processed.
    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_count
    }

    /// Get current configuration.
    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    /// Reset all state.
    pub fn reset(&mut self) {
        self.tds_anomaly.reset();
        self.leak.reset();
        self.history.clear();
        self.alerts = self.aggregator.idle();
        self.latest = None;
        self.last_events.clear();
        self.snapshot_count = 0;
    }
}

impl Default for SentinelEngine {
    fn default() -> Self {
        Self::build(SentinelConfig::default())
    }
}

fn transition_event(
    kind: AlertKind,
    transition: LatchTransition,
    value: f64,
) -> Option<AlertEvent> {
    match transition {
        LatchTransition::Triggered { at } => Some(AlertEvent::raised(kind, at, value)),
        LatchTransition::Cleared { since, at } => {
            Some(AlertEvent::resolved(kind, since, at, value))
        }
        LatchTransition::Held { .. } | LatchTransition::Idle => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::FeedHealth;
    use crate::stream::MemorySource;
    use crate::view::LOADING;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 14, 30, 0).unwrap() + Duration::seconds(secs)
    }

    fn flow(value: f64) -> RawFields {
        RawFields::new().with_field("Flow_L_per_min", value)
    }

    fn tds(value: f64) -> RawFields {
        RawFields::new().with_field("TDS_ppm", value)
    }

    #[test]
    fn test_initial_view_is_loading() {
        let engine = SentinelEngine::default();
        let view = engine.view_at(t(0));
        assert_eq!(view.status.water_quality, LOADING);
        assert_eq!(view.feed, FeedHealth::Awaiting);
        assert_eq!(view.alerts.len(), 3);
        assert_eq!(engine.snapshot_count(), 0);
    }

    #[test]
    fn test_tds_anomaly_episodes() {
        let mut engine = SentinelEngine::default();

        let v1 = engine.process_at(&tds(150.0), t(0));
        let v2 = engine.process_at(&tds(50.0), t(1));
        let v3 = engine.process_at(&tds(150.0), t(2));

        let a1 = v1.alert(AlertKind::TdsAnomaly).unwrap();
        let a2 = v2.alert(AlertKind::TdsAnomaly).unwrap();
        let a3 = v3.alert(AlertKind::TdsAnomaly).unwrap();
        assert!(a1.is_active);
        assert!(!a2.is_active);
        assert!(a3.is_active);
        assert_eq!(a1.triggered_at, Some(t(0)));
        assert_eq!(a3.triggered_at, Some(t(2)));
        assert_ne!(a1.triggered_at, a3.triggered_at);
    }

    #[test]
    fn test_leak_timestamp_latched() {
        let mut engine = SentinelEngine::default();
        let views: Vec<_> = (0..3)
            .map(|i| engine.process_at(&flow(0.3), t(i)))
            .collect();
        let cleared = engine.process_at(&flow(0.0), t(3));

        for view in &views {
            let leak = view.alert(AlertKind::Leak).unwrap();
            assert!(leak.is_active);
            assert_eq!(leak.triggered_at, Some(t(0)));
        }
        assert!(!cleared.alert(AlertKind::Leak).unwrap().is_active);
    }

    #[test]
    fn test_events_and_history() {
        let mut engine = SentinelEngine::default();
        let raised = engine.process_at(&flow(0.2), t(0));
        let held = engine.process_at(&flow(0.2), t(1));
        let resolved = engine.process_at(&flow(0.0), t(2));

        assert_eq!(raised.events.len(), 1);
        assert_eq!(raised.events[0].transition, AlertTransition::Raised);
        assert!(held.events.is_empty());
        assert_eq!(resolved.events[0].transition, AlertTransition::Resolved);
        assert_eq!(resolved.events[0].triggered_at, t(0));
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn test_history_capacity_respected() {
        let mut config = SentinelConfig::default();
        config.history.capacity = 3;
        let mut engine = SentinelEngine::new(config).unwrap();
        for i in 0..10 {
            let value = if i % 2 == 0 { 150.0 } else { 50.0 };
            engine.process_at(&tds(value), t(i));
        }
        assert_eq!(engine.history().len(), 3);
    }

    #[test]
    fn test_malformed_fields_default_to_zero() {
        let mut engine = SentinelEngine::default();
        let raw = RawFields::new()
            .with_field("Flow_L_per_min", "abc")
            .with_field("TDS_ppm", -20.0);
        let view = engine.process_at(&raw, t(0));

        assert_eq!(view.readings.flow_rate.value, Some(0.0));
        assert_eq!(view.readings.tds.value, Some(0.0));
        assert_eq!(view.readings.volume.value, Some(0.0));
        assert_eq!(view.status.water_quality, "SAFE");
        assert_eq!(view.status.flow, "NORMAL");
        assert_eq!(view.active_alerts, 0);
    }

    #[test]
    fn test_active_alert_count() {
        let mut engine = SentinelEngine::default();
        let raw = flow(0.3).with_field("TDS_ppm", 400.0);
        let view = engine.process_at(&raw, t(0));
        assert_eq!(view.active_alerts, 2);
        assert_eq!(engine.active_alert_count(), 2);
    }

    #[test]
    fn test_out_of_order_time_processed() {
        let mut engine = SentinelEngine::default();
        engine.process_at(&tds(150.0), t(10));
        let view = engine.process_at(&tds(150.0), t(5));
        assert_eq!(engine.snapshot_count(), 2);
        assert_eq!(
            view.alert(AlertKind::TdsAnomaly).unwrap().triggered_at,
            Some(t(10))
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SentinelConfig::default();
        config.history.capacity = 0;
        assert!(SentinelEngine::new(config).is_err());
    }

    #[test]
    fn test_run_over_memory_source() {
        let mut source = MemorySource::new();
        let subscription = SentinelEngine::attach(&mut source).unwrap();
        for value in [150.0, 150.0, 50.0] {
            source.publish(tds(value)).unwrap();
        }
        source.close();

        let mut engine = SentinelEngine::default();
        let mut tick = 0;
        let mut active = Vec::new();
        let summary = engine.run_with_clock(
            &subscription,
            || {
                tick += 1;
                t(tick)
            },
            |view| active.push(view.alert(AlertKind::TdsAnomaly).unwrap().is_active),
        );

        assert_eq!(active, vec![true, true, false]);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.raised, 1);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.ended, RunEnd::Closed);
    }

    #[test]
    fn test_attach_surfaces_failure() {
        let mut source = MemorySource::new();
        let _first = SentinelEngine::attach(&mut source).unwrap();
        let err = SentinelEngine::attach(&mut source).unwrap_err();
        assert_eq!(err, SubscribeError::AlreadySubscribed);
    }

    #[test]
    fn test_reset() {
        let mut engine = SentinelEngine::default();
        engine.process_at(&flow(0.3), t(0));
        engine.reset();

        assert_eq!(engine.snapshot_count(), 0);
        assert_eq!(engine.active_alert_count(), 0);
        assert!(engine.history().is_empty());
        assert!(engine.latest_snapshot().is_none());
    }
}
