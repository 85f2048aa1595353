//! Derived metrics computed from a normalized snapshot
//!
//! Each derived metric is an independent pure function of the snapshot.
//! Nothing here holds state between snapshots.

use crate::snapshot::SensorSnapshot;
use serde::{Deserialize, Serialize};

/// Ratio of TDS (ppm) to electrical conductivity (µS/cm) for fresh water
pub const TDS_CONDUCTIVITY_RATIO: f64 = 0.64;

/// Secondary metrics for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Estimated electrical conductivity in µS/cm
    pub conductivity_us_cm: f64,
}

impl DerivedMetrics {
    /// Compute all derived metrics for a snapshot
    pub fn derive(snapshot: &SensorSnapshot) -> Self {
        Self {
            conductivity_us_cm: conductivity_from_tds(snapshot.tds_ppm),
        }
    }
}

/// Estimate conductivity (µS/cm) from total dissolved solids (ppm)
pub fn conductivity_from_tds(tds_ppm: f64) -> f64 {
    tds_ppm / TDS_CONDUCTIVITY_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn snapshot_with_tds(tds_ppm: f64) -> SensorSnapshot {
        SensorSnapshot {
            flow_rate_lpm: 0.0,
            tds_ppm,
            volume_ml: 0.0,
            pressure_psi: 0.0,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_conductivity_exact() {
        assert_eq!(conductivity_from_tds(640.0), 1000.0);
    }

    #[test]
    fn test_conductivity_zero() {
        let derived = DerivedMetrics::derive(&snapshot_with_tds(0.0));
        assert_eq!(derived.conductivity_us_cm, 0.0);
    }

    #[test]
    fn test_conductivity_from_snapshot() {
        let derived = DerivedMetrics::derive(&snapshot_with_tds(150.0));
        assert_relative_eq!(derived.conductivity_us_cm, 234.375);
    }
}
