//! Exploration settings shared by every sequence of a registry.

use serde::{Deserialize, Serialize};

/// Default cap on materialized gradings. `|B(24)| = 75025`, far beyond what
/// dense matrices can hold, so hitting it means a runaway request.
pub const DEFAULT_MAX_GRADING: usize = 24;

/// Largest magnitude an entry may have before [`crate::registry::RankMatrices::anomalies`]
/// reports it.
pub const DEFAULT_ANOMALY_BOUND: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Largest grading any derived sequence may materialize.
    pub max_grading: usize,
    /// Entries above this value (or below zero) are anomalies.
    pub anomaly_bound: i64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            max_grading: DEFAULT_MAX_GRADING,
            anomaly_bound: DEFAULT_ANOMALY_BOUND,
        }
    }
}

impl ExplorationConfig {
    pub fn with_max_grading(mut self, max_grading: usize) -> Self {
        self.max_grading = max_grading;
        self
    }

    pub fn with_anomaly_bound(mut self, anomaly_bound: i64) -> Self {
        self.anomaly_bound = anomaly_bound;
        self
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn cbor_roundtrip() {
        let config = ExplorationConfig::default()
            .with_max_grading(12)
            .with_anomaly_bound(2);
        let bytes = config.to_cbor().unwrap();
        assert_eq!(ExplorationConfig::from_cbor(&bytes).unwrap(), config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let mut partial = BTreeMap::new();
        partial.insert("max_grading".to_string(), 7u64);
        let bytes = serde_cbor::to_vec(&partial).unwrap();
        let config = ExplorationConfig::from_cbor(&bytes).unwrap();
        assert_eq!(config.max_grading, 7);
        assert_eq!(config.anomaly_bound, DEFAULT_ANOMALY_BOUND);
    }
}
