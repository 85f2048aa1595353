// Sentinel Testdata - Synthetic telemetry feeds
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Sentinel Testdata
//!
//! Deterministic synthetic feeds for the Hydro Sentinel engine.
//!
//! Each [`FeedScenario`] produces raw field maps shaped like the device's
//! real-time feed, together with the alert episodes a correct engine must
//! report:
//!
//! - **SteadyUse**: usage bursts and clean water, no alerts
//! - **SlowLeak**: a trickle inside the leak band for the middle of the feed
//! - **TdsSpike**: a window of high dissolved solids
//! - **NoisyFeed**: missing, negative and non-numeric fields mixed in
//!
//! ## Quick Start
//!
//! ```rust
//! use sentinel_testdata::{generate_feed, FeedConfig, FeedScenario};
//!
//! let config = FeedConfig::new()
//!     .with_sample_interval_secs(5)
//!     .with_num_samples(100)
//!     .with_seed(42);
//!
//! let feed = generate_feed(FeedScenario::SlowLeak, &config);
//! assert_eq!(feed.len(), 100);
//! assert!(feed.expects_active("leak", 50));
//!
//! let jsonl = feed.to_jsonl();
//! assert_eq!(jsonl.lines().count(), 100);
//! ```

pub mod feed;
pub mod generator;
pub mod scenario;

// Re-exports for convenience
pub use feed::{read_jsonl, Feed, FeedError, FeedSample};
pub use generator::{generate_feed, FeedConfig, FLOW_KEY, PRESSURE_KEY, TDS_KEY, VOLUME_KEY};
pub use scenario::{ExpectedEpisode, FeedScenario, LEAK, TDS_ANOMALY};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
