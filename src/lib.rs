//! # Hydro Sentinel
//!
//! Real-time threshold evaluation and alert latching for a water-monitoring
//! IoT device (flow rate, total dissolved solids, volume, pressure).
//!
//! ## Pipeline
//!
//! Every incoming snapshot is processed as one unit of work:
//!
//! - **Normalize**: raw, loosely-typed fields become a [`SensorSnapshot`];
//!   missing or malformed values default to zero
//! - **Derive**: secondary metrics such as conductivity ([`DerivedMetrics`])
//! - **Classify**: status labels from ordered [`ThresholdTable`]s
//! - **Latch**: leak and TDS-anomaly conditions, each with its own
//!   [`ConditionLatch`] recording when the episode started
//! - **Aggregate**: one [`AlertState`] per alert type
//! - **Project**: an immutable [`DashboardView`] for the presentation layer
//!
//! ## Quick Start
//!
//! ```rust
//! use hydro_sentinel::{AlertKind, RawFields, SentinelEngine};
//!
//! let mut engine = SentinelEngine::default();
//!
//! let raw = RawFields::new()
//!     .with_field("Flow_L_per_min", 0.3)
//!     .with_field("TDS_ppm", 640.0);
//! let view = engine.process(&raw);
//!
//! assert_eq!(view.readings.conductivity.value, Some(1000.0));
//! assert_eq!(view.status.water_quality, "WARNING");
//! assert!(view.alert(AlertKind::Leak).unwrap().is_active);
//! ```
//!
//! ## Streaming
//!
//! ```rust
//! use hydro_sentinel::{MemorySource, RawFields, SentinelEngine};
//!
//! let mut source = MemorySource::new();
//! let subscription = SentinelEngine::attach(&mut source).unwrap();
//!
//! source.publish(RawFields::new().with_field("TDS_ppm", 150.0)).unwrap();
//! source.close();
//!
//! let mut engine = SentinelEngine::default();
//! let summary = engine.run(&subscription, |view| {
//!     println!("{} active alerts", view.active_alerts);
//! });
//! assert_eq!(summary.processed, 1);
//! assert_eq!(summary.raised, 1);
//! ```
//!
//! ## Modules
//!
//! - [`snapshot`]: Raw fields and normalization
//! - [`metrics`]: Derived metrics
//! - [`classifier`]: Threshold tables and classification
//! - [`latch`]: Condition latches
//! - [`alert`]: Alert state aggregation
//! - [`event`]: Alert transition events and history
//! - [`view`]: Dashboard view projection
//! - [`stream`]: Inbound snapshot feed
//! - [`engine`]: Orchestration

pub mod alert;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod health;
pub mod latch;
pub mod metrics;
pub mod snapshot;
pub mod stream;
pub mod view;

// Re-exports for convenient access
pub use alert::{AlertAggregator, AlertKind, AlertSeverity, AlertState, Detector};
pub use classifier::{Band, Classifications, Classifier, Scale, ThresholdSet, ThresholdTable};
pub use config::{ConditionConfig, FeedConfig, HistoryConfig, SentinelConfig};
pub use engine::{RunEnd, RunSummary, SentinelEngine};
pub use error::{ConfigError, FeedError, Result, SentinelError, SubscribeError};
pub use event::{AlertEvent, AlertLog, AlertTransition};
pub use health::FeedHealth;
pub use latch::{Condition, ConditionLatch, ConditionMonitor, LatchState, LatchTransition};
pub use metrics::DerivedMetrics;
pub use snapshot::{FieldMap, RawFields, SensorSnapshot};
pub use stream::{feed, CancelHandle, FeedPublisher, MemorySource, SnapshotSource, Subscription};
pub use view::{DashboardView, Reading, Readings, ViewProjector};
