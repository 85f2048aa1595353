// Sentinel Testdata - Feed scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feed scenario definitions and their expected alert episodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alert id for the leak condition.
pub const LEAK: &str = "leak";
/// Alert id for the TDS anomaly condition.
pub const TDS_ANOMALY: &str = "tds_anomaly";

/// Synthetic feed scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScenario {
    /// Household usage bursts and clean water; no alerts.
    SteadyUse,
    /// Idle line that starts trickling inside the leak band, then recovers.
    SlowLeak,
    /// Clean water with a window of high dissolved solids.
    TdsSpike,
    /// Steady use with missing, negative and non-numeric fields mixed in.
    NoisyFeed,
}

impl FeedScenario {
    /// All scenarios.
    pub const ALL: [FeedScenario; 4] = [
        FeedScenario::SteadyUse,
        FeedScenario::SlowLeak,
        FeedScenario::TdsSpike,
        FeedScenario::NoisyFeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedScenario::SteadyUse => "steady_use",
            FeedScenario::SlowLeak => "slow_leak",
            FeedScenario::TdsSpike => "tds_spike",
            FeedScenario::NoisyFeed => "noisy_feed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FeedScenario::SteadyUse => "Usage bursts between idle periods, TDS well below limits",
            FeedScenario::SlowLeak => "Flow of 0.15-0.45 L/min from 40% to 80% of the feed",
            FeedScenario::TdsSpike => "TDS of 150-400 ppm from 50% to 70% of the feed",
            FeedScenario::NoisyFeed => "Steady use with malformed and missing fields",
        }
    }

    /// Sample range `[start, end)` of the scenario's anomaly window, if any.
    pub fn anomaly_window(&self, num_samples: usize) -> Option<(usize, usize)> {
        match self {
            FeedScenario::SlowLeak => Some((num_samples * 2 / 5, num_samples * 4 / 5)),
            FeedScenario::TdsSpike => Some((num_samples / 2, num_samples * 7 / 10)),
            FeedScenario::SteadyUse | FeedScenario::NoisyFeed => None,
        }
    }

    /// Alert episodes a correct engine must report for this scenario.
    pub fn expected_episodes(&self, num_samples: usize) -> Vec<ExpectedEpisode> {
        let alert = match self {
            FeedScenario::SlowLeak => LEAK,
            FeedScenario::TdsSpike => TDS_ANOMALY,
            FeedScenario::SteadyUse | FeedScenario::NoisyFeed => return Vec::new(),
        };
        self.anomaly_window(num_samples)
            .filter(|(start, end)| start < end)
            .map(|(start, end)| ExpectedEpisode {
                alert: alert.to_string(),
                start_sample: start,
                end_sample: end,
            })
            .into_iter()
            .collect()
    }
}

impl fmt::Display for FeedScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FeedScenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown scenario '{}', expected one of: steady_use, slow_leak, tds_spike, noisy_feed",
                    s
                )
            })
    }
}

/// One expected alert episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEpisode {
    /// Alert id (`leak` or `tds_anomaly`).
    pub alert: String,
    /// First sample where the alert is active.
    pub start_sample: usize,
    /// First sample where the alert is inactive again.
    pub end_sample: usize,
}

impl ExpectedEpisode {
    /// Whether the alert should be active at a sample index.
    pub fn covers(&self, sample: usize) -> bool {
        sample >= self.start_sample && sample < self.end_sample
    }
}
