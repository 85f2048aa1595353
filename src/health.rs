//! Feed health
//!
//! Tells the presentation layer whether the values on display are current.
//! A stalled feed keeps the last computed view; this marks it stale.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Health of the inbound snapshot feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedHealth {
    /// No snapshot received yet
    #[default]
    Awaiting,
    /// Last snapshot is recent
    Live,
    /// Last snapshot is older than the staleness window
    Stale,
}

impl FeedHealth {
    /// Assess the feed from the time of the last snapshot.
    ///
    /// `Stale` requires strictly more than `stale_after` to have elapsed.
    pub fn assess(
        last_observed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Self {
        match last_observed {
            None => FeedHealth::Awaiting,
            Some(observed) if now.signed_duration_since(observed) > stale_after => {
                FeedHealth::Stale
            }
            Some(_) => FeedHealth::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, FeedHealth::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedHealth::Awaiting => "awaiting",
            FeedHealth::Live => "live",
            FeedHealth::Stale => "stale",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_awaiting_before_first_snapshot() {
        assert_eq!(
            FeedHealth::assess(None, t(0), Duration::seconds(60)),
            FeedHealth::Awaiting
        );
    }

    #[test]
    fn test_live_within_window() {
        let window = Duration::seconds(60);
        assert_eq!(FeedHealth::assess(Some(t(0)), t(30), window), FeedHealth::Live);
        assert_eq!(FeedHealth::assess(Some(t(0)), t(60), window), FeedHealth::Live);
    }

    #[test]
    fn test_stale_after_window() {
        let health = FeedHealth::assess(Some(t(0)), t(61), Duration::seconds(60));
        assert_eq!(health, FeedHealth::Stale);
        assert!(!health.is_live());
        assert_eq!(health.as_str(), "stale");
    }

    #[test]
    fn test_clock_behind_observation_is_live() {
        let health = FeedHealth::assess(Some(t(10)), t(0), Duration::seconds(60));
        assert_eq!(health, FeedHealth::Live);
    }
}
