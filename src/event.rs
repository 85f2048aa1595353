// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert transition events and the in-memory alert log.

use crate::alert::{AlertKind, AlertSeverity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Direction of an alert transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    Raised,
    Resolved,
}

impl AlertTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTransition::Raised => "raised",
            AlertTransition::Resolved => "resolved",
        }
    }
}

/// One alert becoming active or resolving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub transition: AlertTransition,
    pub severity: AlertSeverity,
    /// When the transition was observed.
    pub at: DateTime<Utc>,
    /// Start of the episode this event belongs to.
    pub triggered_at: DateTime<Utc>,
    /// Reading that caused the transition.
    pub value: f64,
    /// Human-readable message.
    pub message: String,
}

impl AlertEvent {
    /// Create a raised event.
    pub fn raised(kind: AlertKind, at: DateTime<Utc>, value: f64) -> Self {
        Self {
            kind,
            transition: AlertTransition::Raised,
            severity: kind.severity(),
            at,
            triggered_at: at,
            value,
            message: format!("{} (value {:.2})", kind.title(), value),
        }
    }

    /// Create a resolved event for an episode that started at `triggered_at`.
    pub fn resolved(
        kind: AlertKind,
        triggered_at: DateTime<Utc>,
        at: DateTime<Utc>,
        value: f64,
    ) -> Self {
        let lasted = at.signed_duration_since(triggered_at);
        Self {
            kind,
            transition: AlertTransition::Resolved,
            severity: kind.severity(),
            at,
            triggered_at,
            value,
            message: format!(
                "{} resolved after {}s (value {:.2})",
                kind.title(),
                lasted.num_seconds(),
                value
            ),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Bounded log of recent alert events, oldest first.
#[derive(Debug, Clone)]
pub struct AlertLog {
    capacity: usize,
    events: VecDeque<AlertEvent>,
}

impl AlertLog {
    /// Create a log holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: AlertEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.events.iter()
    }

    /// Up to `n` most recent events, newest first.
    pub fn recent(&self, n: usize) -> Vec<&AlertEvent> {
        self.events.iter().rev().take(n).collect()
    }

    /// Events for one alert type, oldest first.
    pub fn for_kind(&self, kind: AlertKind) -> Vec<&AlertEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Owned copy of the log, oldest first.
    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 15, 15, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_raised_event() {
        let event = AlertEvent::raised(AlertKind::Leak, t(0), 0.3);
        assert_eq!(event.transition, AlertTransition::Raised);
        assert_eq!(event.severity, AlertSeverity::Danger);
        assert_eq!(event.triggered_at, t(0));
        assert!(event.message.contains("LEAK DETECTED"));
    }

    #[test]
    fn test_resolved_event_keeps_episode_start() {
        let event = AlertEvent::resolved(AlertKind::TdsAnomaly, t(0), t(90), 50.0);
        assert_eq!(event.transition, AlertTransition::Resolved);
        assert_eq!(event.triggered_at, t(0));
        assert_eq!(event.at, t(90));
        assert!(event.message.contains("90s"));
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = AlertLog::new(2);
        log.push(AlertEvent::raised(AlertKind::Leak, t(0), 0.3));
        log.push(AlertEvent::resolved(AlertKind::Leak, t(0), t(10), 0.0));
        log.push(AlertEvent::raised(AlertKind::TdsAnomaly, t(20), 150.0));

        assert_eq!(log.len(), 2);
        let kinds: Vec<_> = log.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Leak, AlertKind::TdsAnomaly]);
        assert_eq!(log.iter().next().unwrap().transition, AlertTransition::Resolved);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = AlertLog::new(10);
        log.push(AlertEvent::raised(AlertKind::Leak, t(0), 0.3));
        log.push(AlertEvent::raised(AlertKind::TdsAnomaly, t(5), 150.0));

        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, AlertKind::TdsAnomaly);
        assert_eq!(log.for_kind(AlertKind::Leak).len(), 1);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let log = AlertLog::new(0);
        assert_eq!(log.capacity(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_json() {
        let event = AlertEvent::raised(AlertKind::TdsAnomaly, t(0), 150.0);
        let json = event.to_json().unwrap();
        assert!(json.contains("\"transition\":\"raised\""));
        assert!(json.contains("\"kind\":\"tds_anomaly\""));
    }
}
