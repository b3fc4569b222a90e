//! Runtime configuration and the stock lookup tables.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    corridor::CorridorGraph,
    drift::DriftThresholds,
    error::QubeError,
    intent::{IntentDatabase, URGENT_INTENT},
    interpreter::DEFAULT_ALIGNMENT_THRESHOLD,
    voxel::DEFAULT_CACHE_CAPACITY,
};

/// Default bound on retained decision log entries.
pub const DEFAULT_DECISION_LOG_CAPACITY: usize = 10_000;

/// Everything the runtime needs besides the action registry.
///
/// Missing fields in a config file fall back to the stock values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QubeConfig {
    /// Corridor adjacency.
    pub corridor_graph: CorridorGraph,
    /// Intent fingerprint labels.
    pub intent_database: IntentDatabase,
    /// `psi` at or above which intent is aligned.
    pub alignment_threshold: f64,
    /// Drift classification thresholds.
    pub drift: DriftThresholds,
    /// Retained decision log entries.
    pub decision_log_capacity: usize,
    /// Memoised voxel signatures.
    pub voxel_cache_capacity: usize,
}

impl Default for QubeConfig {
    fn default() -> Self {
        Self {
            corridor_graph: default_corridor_graph(),
            intent_database: default_intent_database(),
            alignment_threshold: DEFAULT_ALIGNMENT_THRESHOLD,
            drift: DriftThresholds::default(),
            decision_log_capacity: DEFAULT_DECISION_LOG_CAPACITY,
            voxel_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl QubeConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QubeError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| QubeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| QubeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks threshold ordering and ranges and non-zero capacities.
    pub fn validate(&self) -> Result<(), QubeError> {
        let unit = 0.0..=1.0;
        let DriftThresholds { warning, critical } = self.drift;
        if !unit.contains(&warning) || !unit.contains(&critical) {
            return Err(QubeError::InvalidConfig(format!(
                "drift thresholds must lie in [0, 1], got warning={warning} critical={critical}"
            )));
        }
        if warning > critical {
            return Err(QubeError::InvalidConfig(format!(
                "drift warning {warning} exceeds critical {critical}"
            )));
        }
        if !unit.contains(&self.alignment_threshold) {
            return Err(QubeError::InvalidConfig(format!(
                "alignment threshold {} outside [0, 1]",
                self.alignment_threshold
            )));
        }
        if self.decision_log_capacity == 0 || self.voxel_cache_capacity == 0 {
            return Err(QubeError::InvalidConfig(
                "capacities must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// The stock two-edge corridor graph.
#[must_use]
pub fn default_corridor_graph() -> CorridorGraph {
    let mut graph = CorridorGraph::new();
    graph.insert(
        "DISTRICT_1.CHAMBER_0.NODE_START".into(),
        vec!["DISTRICT_1.CHAMBER_0.NODE_PROCESS".into()],
    );
    graph.insert(
        "DISTRICT_1.CHAMBER_0.NODE_PROCESS".into(),
        vec!["DISTRICT_2.CHAMBER_LORA.NODE_PRE".into()],
    );
    graph
}

/// The stock intent fingerprints.
#[must_use]
pub fn default_intent_database() -> IntentDatabase {
    [
        ("sha256:9f2c8d1e", "EXECUTE_TASK"),
        ("sha256:8b1d2f3c", "NAVIGATE_CORRIDOR"),
        ("sha256:urgent00", URGENT_INTENT),
    ]
    .into_iter()
    .map(|(hash, label)| (hash.to_string(), label.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = QubeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.corridor_graph.len(), 2);
        assert_eq!(
            config.intent_database.get("sha256:urgent00").map(String::as_str),
            Some(URGENT_INTENT)
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.json");
        fs::write(&path, r#"{ "drift": { "critical": 0.9 }, "voxel_cache_capacity": 8 }"#)
            .unwrap();
        let config = QubeConfig::load(&path).unwrap();
        assert!((config.drift.critical - 0.9).abs() < f64::EPSILON);
        assert!((config.drift.warning - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.voxel_cache_capacity, 8);
        assert_eq!(config.intent_database.len(), 3);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.json");
        fs::write(&path, r#"{ "drift": { "warning": 0.8, "critical": 0.4 } }"#).unwrap();
        assert!(matches!(
            QubeConfig::load(&path),
            Err(QubeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            QubeConfig::load(dir.path().join("absent.json")),
            Err(QubeError::ConfigIo { .. })
        ));
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            QubeConfig::load(&path),
            Err(QubeError::ConfigParse { .. })
        ));
    }
}
