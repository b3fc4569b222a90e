use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

/// Samples retained by the drift monitor.
pub const DRIFT_HISTORY_CAPACITY: usize = 100;

/// Tri-state classification of the autonomy index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriftStatus {
    /// Below the warning threshold.
    Nominal,
    /// At or above warning, below critical.
    Warning,
    /// At or above critical.
    Critical,
}

impl DriftStatus {
    /// Upper-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nominal => "NOMINAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Threshold pair used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftThresholds {
    /// Lower bound of [`DriftStatus::Warning`].
    pub warning: f64,
    /// Lower bound of [`DriftStatus::Critical`].
    pub critical: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            warning: 0.3,
            critical: 0.7,
        }
    }
}

impl DriftThresholds {
    /// Classifies one sample, critical first.
    #[must_use]
    pub fn classify(&self, index: f64) -> DriftStatus {
        if index >= self.critical {
            DriftStatus::Critical
        } else if index >= self.warning {
            DriftStatus::Warning
        } else {
            DriftStatus::Nominal
        }
    }
}

/// Classifies autonomy samples and keeps the last hundred as an audit trail.
///
/// Classification only ever looks at the newest sample.
#[derive(Debug, Clone, Default)]
pub struct AutonomyDriftMonitor {
    thresholds: DriftThresholds,
    history: VecDeque<f64>,
}

impl AutonomyDriftMonitor {
    /// Creates a monitor with custom thresholds.
    #[must_use]
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self {
            thresholds,
            history: VecDeque::with_capacity(DRIFT_HISTORY_CAPACITY + 1),
        }
    }

    /// Records `index` and classifies it.
    pub fn check_drift(&mut self, index: f64) -> DriftStatus {
        self.history.push_back(index);
        if self.history.len() > DRIFT_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.thresholds.classify(index)
    }

    /// Retained samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> DriftThresholds {
        self.thresholds
    }
}
