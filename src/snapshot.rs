// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Snapshot normalization.
//!
//! The device feed delivers loosely typed field mappings. Every numeric
//! field the engine needs is read from that mapping and defaults to `0.0`
//! when absent, non-numeric, non-finite or negative. Nothing is rejected:
//! one corrupt field must not stop monitoring.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw field mapping as received from the telemetry feed.
///
/// Example JSON:
/// ```json
/// { "Flow_L_per_min": 0.32, "TDS_ppm": "148", "Volume_mL": 1520.5 }
/// ```
///
/// Deserialization only requires a JSON object. A field value that is
/// valid JSON but cannot be held as a `Value` (a number such as `1e400`
/// that overflows `f64`) is kept as its raw text in a string, so the
/// other fields of the object survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawFields(Map<String, Value>);

impl<'de> Deserialize<'de> for RawFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = BTreeMap::<String, Box<RawValue>>::deserialize(deserializer)?;
        Ok(Self(
            fields
                .into_iter()
                .map(|(key, raw)| {
                    let value = lenient_value(&key, &raw);
                    (key, value)
                })
                .collect(),
        ))
    }
}

fn lenient_value(key: &str, raw: &RawValue) -> Value {
    serde_json::from_str(raw.get()).unwrap_or_else(|e| {
        debug!("field '{}' kept as raw text ({})", key, e);
        Value::String(raw.get().to_string())
    })
}

impl RawFields {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse a JSON object. Anything other than an object is an error.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builder: set a field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Set a field in place.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Look up a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawFields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Feed key names for each reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    /// Flow rate, L/min.
    pub flow: String,
    /// Total dissolved solids, ppm.
    pub tds: String,
    /// Cumulative volume, mL.
    pub volume: String,
    /// Line pressure, PSI.
    pub pressure: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            flow: "Flow_L_per_min".to_string(),
            tds: "TDS_ppm".to_string(),
            volume: "Volume_mL".to_string(),
            pressure: "Pressure_PSI".to_string(),
        }
    }
}

/// One normalized point-in-time set of readings.
///
/// All readings are finite and `>= 0.0`. `observed_at` is the time the
/// engine received the snapshot, never a timestamp taken from the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub flow_rate_lpm: f64,
    pub tds_ppm: f64,
    pub volume_ml: f64,
    pub pressure_psi: f64,
    pub observed_at: DateTime<Utc>,
}

impl SensorSnapshot {
    /// Normalize a raw mapping received at `observed_at`.
    pub fn normalize(raw: &RawFields, fields: &FieldMap, observed_at: DateTime<Utc>) -> Self {
        Self {
            flow_rate_lpm: read_field(raw, &fields.flow),
            tds_ppm: read_field(raw, &fields.tds),
            volume_ml: read_field(raw, &fields.volume),
            pressure_psi: read_field(raw, &fields.pressure),
            observed_at,
        }
    }
}

/// Read one field, logging when a present value had to be defaulted.
fn read_field(raw: &RawFields, key: &str) -> f64 {
    let value = raw.get(key);
    let reading = parse_reading(value);
    if let Some(v) = value {
        if reading == 0.0 && !is_zero(v) {
            debug!("field '{}' defaulted to 0 (raw value: {})", key, v);
        }
    }
    reading
}

fn is_zero(value: &Value) -> bool {
    matches!(value.as_f64(), Some(v) if v == 0.0)
}

/// Interpret a raw JSON value as a non-negative finite reading.
///
/// Numbers and numeric strings (surrounding whitespace allowed) are accepted.
/// Missing, null, boolean, composite, unparsable, non-finite and negative
/// values all yield `0.0`.
pub fn parse_reading(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}
