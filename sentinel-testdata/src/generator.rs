// Sentinel Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feed generation.
//!
//! Produces raw field maps shaped like the device's real-time feed:
//! `Flow_L_per_min`, `TDS_ppm`, `Volume_mL` and `Pressure_PSI`.

use crate::feed::{Feed, FeedSample};
use crate::scenario::FeedScenario;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw key for flow rate (L/min).
pub const FLOW_KEY: &str = "Flow_L_per_min";
/// Raw key for total dissolved solids (ppm).
pub const TDS_KEY: &str = "TDS_ppm";
/// Raw key for cumulative volume (mL).
pub const VOLUME_KEY: &str = "Volume_mL";
/// Raw key for line pressure (PSI).
pub const PRESSURE_KEY: &str = "Pressure_PSI";

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Timestamp of the first sample.
    pub start_time: DateTime<Utc>,
    /// Interval between samples in milliseconds.
    pub sample_interval_ms: u64,
    /// Number of samples to generate.
    pub num_samples: usize,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            start_time: Utc
                .timestamp_opt(1_736_496_000, 0)
                .single()
                .unwrap_or_default(), // 2025-01-10 08:00:00 UTC
            sample_interval_ms: 5_000,
            num_samples: 120, // 10 minutes
            seed: None,
        }
    }
}

impl FeedConfig {
    /// Create a new feed config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set start time.
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Set sample interval.
    pub fn with_sample_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sample_interval_ms = interval_ms;
        self
    }

    /// Set sample interval in seconds.
    pub fn with_sample_interval_secs(mut self, secs: u64) -> Self {
        self.sample_interval_ms = secs * 1000;
        self
    }

    /// Set number of samples.
    pub fn with_num_samples(mut self, n: usize) -> Self {
        self.num_samples = n;
        self
    }

    /// Set duration in minutes (calculates num_samples from interval).
    pub fn with_duration_minutes(mut self, minutes: f64) -> Self {
        let total_ms = minutes * 60_000.0;
        self.num_samples = (total_ms / self.sample_interval_ms.max(1) as f64).ceil() as usize;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Timestamp of a sample.
    pub fn sample_time(&self, index: usize) -> DateTime<Utc> {
        let offset = self.sample_interval_ms.saturating_mul(index as u64);
        self.start_time + Duration::milliseconds(i64::try_from(offset).unwrap_or(i64::MAX / 2))
    }
}

/// Per-sample physical state before it is written as raw fields.
struct Reading {
    flow: f64,
    tds: f64,
    volume: f64,
    pressure: f64,
}

/// Generate a feed for a scenario.
pub fn generate_feed(scenario: FeedScenario, config: &FeedConfig) -> Feed {
    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let window = scenario.anomaly_window(config.num_samples);
    let in_window = |i: usize| matches!(window, Some((start, end)) if i >= start && i < end);
    let interval_min = config.sample_interval_ms as f64 / 60_000.0;

    let mut volume = 0.0;
    let mut samples = Vec::with_capacity(config.num_samples);

    for i in 0..config.num_samples {
        let flow = match scenario {
            FeedScenario::SlowLeak if in_window(i) => rng.gen_range(0.15..=0.45),
            FeedScenario::SlowLeak => 0.0,
            _ if i % 10 < 3 => gaussian(&mut rng, 5.0, 1.0).clamp(2.0, 9.0),
            _ => 0.0,
        };

        let tds = match scenario {
            FeedScenario::TdsSpike if in_window(i) => rng.gen_range(150.0..=400.0),
            _ => gaussian(&mut rng, 60.0, 8.0).clamp(20.0, 95.0),
        };

        volume += flow * interval_min * 1000.0;

        let reading = Reading {
            flow: round2(flow),
            tds: round2(tds),
            volume: round2(volume),
            pressure: round2(gaussian(&mut rng, 45.8, 0.8).clamp(20.0, 60.0)),
        };

        let fields = match scenario {
            FeedScenario::NoisyFeed => noisy_fields(&reading, i),
            _ => clean_fields(&reading),
        };

        samples.push(FeedSample {
            timestamp: config.sample_time(i),
            fields,
        });
    }

    Feed {
        scenario,
        config: config.clone(),
        samples,
        expected: scenario.expected_episodes(config.num_samples),
    }
}

fn gaussian(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std * z
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clean_fields(reading: &Reading) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FLOW_KEY.to_string(), Value::from(reading.flow));
    fields.insert(TDS_KEY.to_string(), Value::from(reading.tds));
    fields.insert(VOLUME_KEY.to_string(), Value::from(reading.volume));
    fields.insert(PRESSURE_KEY.to_string(), Value::from(reading.pressure));
    fields
}

/// Corrupt fields on a fixed schedule so results stay reproducible.
fn noisy_fields(reading: &Reading, index: usize) -> Map<String, Value> {
    let mut fields = clean_fields(reading);
    if index % 7 == 3 {
        fields.remove(TDS_KEY);
    }
    if index % 11 == 5 {
        fields.insert(FLOW_KEY.to_string(), Value::from("n/a"));
    }
    if index % 13 == 6 {
        fields.insert(VOLUME_KEY.to_string(), Value::from(-reading.volume - 1.0));
    }
    if index % 17 == 8 {
        fields.insert(PRESSURE_KEY.to_string(), Value::Null);
    }
    if index % 19 == 9 {
        fields.insert(TDS_KEY.to_string(), Value::from(format!(" {} ", reading.tds)));
    }
    fields
}
