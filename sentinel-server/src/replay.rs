// Sentinel Server - Feed replay
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feed replay for driving the engine without a live device.
//!
//! Rows come from a JSON-lines recording or a generated scenario and are
//! published into the engine's snapshot feed at a fixed cadence.

use crate::metrics::update_replay_metrics;
use hydro_sentinel::{FeedError, FeedPublisher, RawFields};
use sentinel_testdata::{generate_feed, FeedConfig as GeneratorConfig, FeedScenario};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for feed replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Replay speed multiplier (1.0 = real-time, 10.0 = 10x faster).
    pub speed: f64,
    /// Whether to start over at the end of the feed.
    pub loop_replay: bool,
    /// Interval between rows in milliseconds at 1x speed.
    pub interval_ms: u64,
}

impl ReplayConfig {
    /// Pause between rows at the configured speed, in whole milliseconds.
    pub fn sleep_ms(&self) -> u64 {
        (self.interval_ms as f64 / self.speed) as u64
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            loop_replay: true,
            interval_ms: 5_000,
        }
    }
}

/// Shared replay progress.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Next row to publish.
    pub position: AtomicUsize,
    /// Total rows in the feed.
    pub total_samples: AtomicUsize,
    /// Whether replay is running.
    pub running: AtomicBool,
    /// Set by [`ReplayEngine::stop`]; never cleared.
    pub stop_requested: AtomicBool,
}

impl ReplayState {
    pub fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Description of the loaded feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// File path or scenario name.
    pub source: String,
    pub sample_count: usize,
    /// Lines dropped while loading a recording.
    pub skipped_lines: usize,
    pub interval_ms: u64,
    pub speed: f64,
    pub loop_replay: bool,
}

/// Replays rows into a snapshot feed.
pub struct ReplayEngine {
    config: ReplayConfig,
    state: Arc<ReplayState>,
    source: String,
    rows: Vec<RawFields>,
    skipped_lines: usize,
}

impl ReplayEngine {
    /// Load a JSON-lines recording.
    ///
    /// Blank lines are ignored. Lines that are not a JSON object are logged
    /// and skipped, matching how the live feed treats malformed pushes.
    pub fn from_jsonl(path: impl AsRef<Path>, config: ReplayConfig) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReplayError::FileNotFound(path.display().to_string()));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut rows = Vec::new();
        let mut skipped_lines = 0;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match RawFields::from_json(&line) {
                Ok(raw) => rows.push(raw),
                Err(e) => {
                    warn!("Skipping line {} of {}: {}", index + 1, path.display(), e);
                    skipped_lines += 1;
                }
            }
        }

        let mut engine = Self::from_rows(path.display().to_string(), rows, config)?;
        engine.skipped_lines = skipped_lines;
        Ok(engine)
    }

    /// Generate a synthetic scenario feed.
    pub fn from_scenario(
        scenario: FeedScenario,
        generator: &GeneratorConfig,
        config: ReplayConfig,
    ) -> Result<Self, ReplayError> {
        let feed = generate_feed(scenario, generator);
        let rows = feed.fields().cloned().map(RawFields::from).collect();
        Self::from_rows(scenario.as_str(), rows, config)
    }

    /// Replay rows already in memory.
    pub fn from_rows(
        source: impl Into<String>,
        rows: Vec<RawFields>,
        config: ReplayConfig,
    ) -> Result<Self, ReplayError> {
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(ReplayError::InvalidSpeed(config.speed));
        }
        if rows.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }
        if config.loop_replay && config.sleep_ms() == 0 {
            return Err(ReplayError::UnthrottledLoop {
                interval_ms: config.interval_ms,
                speed: config.speed,
            });
        }

        let source = source.into();
        let state = Arc::new(ReplayState::default());
        state.total_samples.store(rows.len(), Ordering::SeqCst);

        info!(
            "Loaded feed '{}': {} samples, {}ms interval",
            source,
            rows.len(),
            config.interval_ms
        );

        Ok(Self {
            config,
            state,
            source,
            rows,
            skipped_lines: 0,
        })
    }

    /// Get the replay state.
    pub fn state(&self) -> Arc<ReplayState> {
        Arc::clone(&self.state)
    }

    /// Get feed info.
    pub fn info(&self) -> FeedInfo {
        FeedInfo {
            source: self.source.clone(),
            sample_count: self.rows.len(),
            skipped_lines: self.skipped_lines,
            interval_ms: self.config.interval_ms,
            speed: self.config.speed,
            loop_replay: self.config.loop_replay,
        }
    }

    /// Publish rows until the feed ends, the consumer goes away, or
    /// [`stop`](Self::stop) is called.
    pub async fn run(&self, publisher: &FeedPublisher) {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "Starting replay: speed={}, loop={}",
            self.config.speed, self.config.loop_replay
        );

        let sleep_ms = self.config.sleep_ms();

        while !self.state.stop_requested.load(Ordering::SeqCst) {
            let position = self.state.position.load(Ordering::SeqCst);

            if position >= self.rows.len() {
                if self.config.loop_replay {
                    info!("Feed complete, looping...");
                    self.state.position.store(0, Ordering::SeqCst);
                    continue;
                }
                info!("Feed complete, stopping");
                break;
            }

            debug!("Publishing sample {}", position);
            if let Err(FeedError::Closed) = publisher.publish(self.rows[position].clone()) {
                info!("Engine unsubscribed, stopping replay");
                break;
            }

            self.state.position.fetch_add(1, Ordering::SeqCst);
            update_replay_metrics(position + 1, self.rows.len(), self.config.speed);

            if sleep_ms > 0 {
                sleep(Duration::from_millis(sleep_ms)).await;
            } else {
                yield_now().await;
            }
        }

        self.state.running.store(false, Ordering::SeqCst);
    }

    /// Stop the replay.
    pub fn stop(&self) {
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Empty feed")]
    EmptyDataset,

    #[error("Invalid replay speed: {0}")]
    InvalidSpeed(f64),

    #[error("Looping replay needs at least 1ms between rows ({interval_ms}ms at {speed}x)")]
    UnthrottledLoop { interval_ms: u64, speed: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_sentinel::feed;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fast() -> ReplayConfig {
        ReplayConfig {
            speed: 1.0,
            loop_replay: false,
            interval_ms: 0,
        }
    }

    fn create_test_feed() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"Flow_L_per_min": 0.3, "TDS_ppm": 40}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"Flow_L_per_min": "0.2", "TDS_ppm": 150}}"#).unwrap();
        writeln!(file, "[1, 2]").unwrap();
        writeln!(file, r#"{{"Flow_L_per_min": 0, "TDS_ppm": 60}}"#).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_jsonl_skips_bad_lines() {
        let file = create_test_feed();
        let engine = ReplayEngine::from_jsonl(file.path(), fast()).expect("Failed to load feed");

        let info = engine.info();
        assert_eq!(info.sample_count, 3);
        assert_eq!(info.skipped_lines, 2);
        assert_eq!(engine.state().total_samples.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_overflowing_number_keeps_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"TDS_ppm": 1e400, "Flow_L_per_min": 0.3}}"#).unwrap();
        file.flush().unwrap();

        let engine = ReplayEngine::from_jsonl(file.path(), fast()).expect("Failed to load feed");
        assert_eq!(engine.info().sample_count, 1);
        assert_eq!(engine.info().skipped_lines, 0);
    }

    #[test]
    fn test_missing_file() {
        let result = ReplayEngine::from_jsonl("/nonexistent/feed.jsonl", fast());
        assert!(matches!(result, Err(ReplayError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_feed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "garbage").unwrap();
        let result = ReplayEngine::from_jsonl(file.path(), fast());
        assert!(matches!(result, Err(ReplayError::EmptyDataset)));
    }

    #[test]
    fn test_invalid_speed() {
        let config = ReplayConfig {
            speed: 0.0,
            ..fast()
        };
        let result = ReplayEngine::from_rows("test", vec![RawFields::new()], config);
        assert!(matches!(result, Err(ReplayError::InvalidSpeed(_))));
    }

    #[test]
    fn test_unthrottled_loop_rejected() {
        let config = ReplayConfig {
            speed: 10_000.0,
            loop_replay: true,
            interval_ms: 5_000,
        };
        let result = ReplayEngine::from_rows("test", vec![RawFields::new()], config);
        assert!(matches!(
            result,
            Err(ReplayError::UnthrottledLoop {
                interval_ms: 5_000,
                ..
            })
        ));

        let config = ReplayConfig {
            loop_replay: true,
            ..fast()
        };
        assert!(ReplayEngine::from_rows("test", vec![RawFields::new()], config).is_err());
    }

    #[test]
    fn test_from_scenario() {
        let generator = GeneratorConfig::new().with_num_samples(25).with_seed(5);
        let engine =
            ReplayEngine::from_scenario(FeedScenario::SlowLeak, &generator, fast()).unwrap();
        let info = engine.info();
        assert_eq!(info.source, "slow_leak");
        assert_eq!(info.sample_count, 25);
    }

    #[tokio::test]
    async fn test_run_publishes_in_order() {
        let file = create_test_feed();
        let engine = ReplayEngine::from_jsonl(file.path(), fast()).unwrap();
        let (publisher, subscription) = feed();

        engine.run(&publisher).await;
        drop(publisher);

        let mut tds = Vec::new();
        while let Some(raw) = subscription.next() {
            tds.push(raw.get("TDS_ppm").and_then(|v| v.as_f64()));
        }
        assert_eq!(tds, vec![Some(40.0), Some(150.0), Some(60.0)]);
        assert_eq!(engine.state().position(), 3);
        assert!(!engine.state().is_running());
    }

    #[tokio::test]
    async fn test_looping_replay_stops_on_request() {
        let engine = Arc::new(
            ReplayEngine::from_rows(
                "test",
                vec![RawFields::new(); 3],
                ReplayConfig {
                    speed: 1.0,
                    loop_replay: true,
                    interval_ms: 1,
                },
            )
            .unwrap(),
        );
        let (publisher, subscription) = feed();

        let runner = Arc::clone(&engine);
        let handle = tokio::spawn(async move { runner.run(&publisher).await });
        sleep(Duration::from_millis(20)).await;
        engine.stop();

        let finished = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(finished.is_ok());
        assert!(!engine.state().is_running());
        assert!(subscription.try_next().unwrap().is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_zero_interval_yields_to_other_tasks() {
        let engine = Arc::new(
            ReplayEngine::from_rows("test", vec![RawFields::new(); 200], fast()).unwrap(),
        );
        let (publisher, _subscription) = feed();

        let runner = Arc::clone(&engine);
        let handle = tokio::spawn(async move { runner.run(&publisher).await });
        // On a single-threaded runtime this only runs if the replay yields.
        yield_now().await;
        assert!(engine.state().position() < 200);

        handle.await.unwrap();
        assert_eq!(engine.state().position(), 200);
    }

    #[tokio::test]
    async fn test_run_stops_when_unsubscribed() {
        let engine = ReplayEngine::from_rows(
            "test",
            vec![RawFields::new(); 4],
            ReplayConfig {
                loop_replay: true,
                interval_ms: 1,
                ..fast()
            },
        )
        .unwrap();
        let (publisher, subscription) = feed();
        subscription.unsubscribe();

        engine.run(&publisher).await;
        assert_eq!(engine.state().position(), 0);
    }
}
