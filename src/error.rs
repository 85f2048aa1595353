// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Hydro Sentinel
//!
//! Malformed telemetry is never an error: the normalizer defaults it. The
//! errors here cover configuration, subscription setup and feed plumbing.

use thiserror::Error;

/// Result type alias for Hydro Sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Main error type for Hydro Sentinel operations
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Subscription error
    #[error("Subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    /// Feed error
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Errors in a [`SentinelConfig`](crate::config::SentinelConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Threshold table has no bands
    #[error("Threshold table '{table}' has no bands")]
    EmptyTable { table: String },

    /// Threshold bounds must be strictly ascending
    #[error("Threshold table '{table}': bound {bound} at position {index} does not exceed the previous bound")]
    UnorderedBounds {
        table: String,
        index: usize,
        bound: f64,
    },

    /// Threshold bound is NaN or infinite
    #[error("Threshold table '{table}': bound at position {index} is not finite")]
    NonFiniteBound { table: String, index: usize },

    /// Empty category label
    #[error("Threshold table '{table}': blank label at position {index}")]
    BlankLabel { table: String, index: usize },

    /// Condition is not satisfiable or uses non-finite limits
    #[error("Invalid condition '{name}': {reason}")]
    InvalidCondition { name: String, reason: String },

    /// Alert history must hold at least one event
    #[error("History capacity must be at least 1")]
    ZeroHistoryCapacity,

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to establish the inbound snapshot subscription
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscribeError {
    /// The source is single-consumer and already has a subscriber
    #[error("Source already has a subscriber")]
    AlreadySubscribed,

    /// The source cannot deliver snapshots
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Errors on the producing side of a feed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// The consumer unsubscribed or was dropped
    #[error("Feed closed by subscriber")]
    Closed,
}
