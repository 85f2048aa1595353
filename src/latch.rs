// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Condition latches.
//!
//! A latch remembers the first time a condition became true and holds that
//! time until the condition clears. It never advances while the condition
//! persists, so a leak that lasts an hour reports the minute it started.
//!
//! Each monitored condition owns its own latch. Sharing one would let a
//! clearing condition erase another condition's trigger time.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Predicate over a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// `min <= value <= max`
    InRange { min: f64, max: f64 },
    /// `value > limit`
    Above { limit: f64 },
    /// `value < limit`
    Below { limit: f64 },
}

impl Condition {
    /// Whether the condition holds for a value.
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Condition::InRange { min, max } => value >= min && value <= max,
            Condition::Above { limit } => value > limit,
            Condition::Below { limit } => value < limit,
        }
    }

    /// Short text form, e.g. `between 0.1 and 0.5`.
    pub fn describe(&self) -> String {
        match *self {
            Condition::InRange { min, max } => format!("between {} and {}", min, max),
            Condition::Above { limit } => format!("above {}", limit),
            Condition::Below { limit } => format!("below {}", limit),
        }
    }

    /// Check limits are finite and the range is non-empty.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCondition {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match *self {
            Condition::InRange { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(invalid("range limits must be finite"));
                }
                if min > max {
                    return Err(invalid("min exceeds max"));
                }
            }
            Condition::Above { limit } | Condition::Below { limit } => {
                if !limit.is_finite() {
                    return Err(invalid("limit must be finite"));
                }
            }
        }
        Ok(())
    }
}

/// Latch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LatchState {
    /// Condition is false.
    #[default]
    Clear,
    /// Condition has been continuously true since `since`.
    Triggered { since: DateTime<Utc> },
}

/// Outcome of feeding one observation to a latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchTransition {
    /// CLEAR -> TRIGGERED
    Triggered { at: DateTime<Utc> },
    /// TRIGGERED -> TRIGGERED, trigger time unchanged
    Held { since: DateTime<Utc> },
    /// TRIGGERED -> CLEAR
    Cleared {
        since: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// CLEAR -> CLEAR
    Idle,
}

impl LatchTransition {
    /// Whether the latch changed state.
    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            LatchTransition::Triggered { .. } | LatchTransition::Cleared { .. }
        )
    }
}

/// Two-state latch recording the first trigger time of a condition.
///
/// `first_triggered_at()` is `Some` exactly when `is_active()` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionLatch {
    state: LatchState,
}

impl ConditionLatch {
    /// Create a latch in the CLEAR state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current truth value of the condition.
    pub fn update(&mut self, condition: bool, now: DateTime<Utc>) -> LatchTransition {
        match (self.state, condition) {
            (LatchState::Clear, true) => {
                self.state = LatchState::Triggered { since: now };
                LatchTransition::Triggered { at: now }
            }
            (LatchState::Triggered { since }, true) => LatchTransition::Held { since },
            (LatchState::Triggered { since }, false) => {
                self.state = LatchState::Clear;
                LatchTransition::Cleared { since, at: now }
            }
            (LatchState::Clear, false) => LatchTransition::Idle,
        }
    }

    /// Whether the condition is currently latched.
    pub fn is_active(&self) -> bool {
        matches!(self.state, LatchState::Triggered { .. })
    }

    /// Time the current episode started.
    pub fn first_triggered_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            LatchState::Triggered { since } => Some(since),
            LatchState::Clear => None,
        }
    }

    /// Current state.
    pub fn state(&self) -> LatchState {
        self.state
    }

    /// Return to CLEAR without reporting a transition.
    pub fn reset(&mut self) {
        self.state = LatchState::Clear;
    }
}

/// A condition bound to its own latch.
#[derive(Debug, Clone)]
pub struct ConditionMonitor {
    name: &'static str,
    condition: Condition,
    latch: ConditionLatch,
    /// Reading seen on the last update.
    last_value: Option<f64>,
}

impl ConditionMonitor {
    pub fn new(name: &'static str, condition: Condition) -> Self {
        Self {
            name,
            condition,
            latch: ConditionLatch::new(),
            last_value: None,
        }
    }

    /// Evaluate the condition against a reading and advance the latch.
    pub fn observe(&mut self, value: f64, now: DateTime<Utc>) -> LatchTransition {
        self.last_value = Some(value);
        let transition = self.latch.update(self.condition.holds(value), now);
        if let LatchTransition::Held { since } = transition {
            debug!("{} still latched since {} (value {})", self.name, since, value);
        }
        transition
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn latch(&self) -> &ConditionLatch {
        &self.latch
    }

    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    pub fn reset(&mut self) {
        self.latch.reset();
        self.last_value = None;
    }
}
