// Sentinel Testdata - Feed structures
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Generated feeds and JSON-lines I/O.
//!
//! A JSON-lines feed holds one raw field object per line, exactly what the
//! device pushes. Sample timestamps are kept alongside in memory only, since
//! the engine stamps snapshots with its own receive time.

use crate::generator::FeedConfig;
use crate::scenario::{ExpectedEpisode, FeedScenario};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Feed error types.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line} is not a JSON object")]
    NotAnObject { line: usize },
}

/// One timestamped raw sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSample {
    /// Time the device would have sent this sample.
    pub timestamp: DateTime<Utc>,
    /// Raw field mapping.
    pub fields: Map<String, Value>,
}

/// A generated feed with its expected alert episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub scenario: FeedScenario,
    pub config: FeedConfig,
    pub samples: Vec<FeedSample>,
    pub expected: Vec<ExpectedEpisode>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw field maps in order.
    pub fn fields(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.samples.iter().map(|s| &s.fields)
    }

    /// Whether `alert` should be active after processing sample `index`.
    pub fn expects_active(&self, alert: &str, index: usize) -> bool {
        self.expected
            .iter()
            .any(|e| e.alert == alert && e.covers(index))
    }

    /// Render as JSON lines, one raw field object per line.
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for sample in &self.samples {
            out.push_str(&Value::Object(sample.fields.clone()).to_string());
            out.push('\n');
        }
        out
    }

    /// Write as JSON lines.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<(), FeedError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for (index, sample) in self.samples.iter().enumerate() {
            serde_json::to_writer(&mut writer, &sample.fields).map_err(|e| FeedError::Json {
                line: index + 1,
                source: e,
            })?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Read raw field objects from a JSON-lines file.
///
/// Blank lines are skipped. Any other line must be a JSON object.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Map<String, Value>>, FeedError> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| FeedError::Json {
            line: index + 1,
            source: e,
        })?;
        match value {
            Value::Object(map) => rows.push(map),
            _ => return Err(FeedError::NotAnObject { line: index + 1 }),
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_feed;

    #[test]
    fn test_jsonl_lines() {
        let feed = generate_feed(
            FeedScenario::SlowLeak,
            &FeedConfig::new().with_num_samples(5).with_seed(1),
        );
        let jsonl = feed.to_jsonl();
        assert_eq!(jsonl.lines().count(), 5);
        assert!(jsonl.lines().all(|l| l.starts_with('{') && l.contains("Flow_L_per_min")));
    }

    #[test]
    fn test_write_and_read_jsonl() {
        let feed = generate_feed(
            FeedScenario::NoisyFeed,
            &FeedConfig::new().with_num_samples(30).with_seed(7),
        );
        let file = tempfile::NamedTempFile::new().unwrap();
        feed.write_jsonl(file.path()).unwrap();

        let rows = read_jsonl(file.path()).unwrap();
        assert_eq!(rows.len(), 30);
        assert_eq!(rows[3], feed.samples[3].fields);
    }

    #[test]
    fn test_read_rejects_non_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"TDS_ppm\": 10}}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "null").unwrap();

        let err = read_jsonl(file.path()).unwrap_err();
        assert!(matches!(err, FeedError::NotAnObject { line: 3 }));
    }

    #[test]
    fn test_expects_active() {
        let feed = generate_feed(
            FeedScenario::TdsSpike,
            &FeedConfig::new().with_num_samples(10).with_seed(3),
        );
        assert!(feed.expects_active("tds_anomaly", 5));
        assert!(!feed.expects_active("tds_anomaly", 7));
        assert!(!feed.expects_active("leak", 5));
    }
}
