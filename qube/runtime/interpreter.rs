use std::{
    f64::consts::{FRAC_PI_2, TAU},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Default `psi` at or above which intent counts as aligned.
pub const DEFAULT_ALIGNMENT_THRESHOLD: f64 = 0.5;

const ACTIVE_OMEGA: f64 = 0.5;
const HYPERACTIVE_OMEGA: f64 = 2.0;

/// Coarse motion class derived from angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    /// `omega < 0.5`.
    Idle,
    /// `0.5 <= omega < 2.0`.
    Active,
    /// `omega >= 2.0`.
    Hyperactive,
}

impl ActivityLevel {
    /// Upper-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Hyperactive => "HYPERACTIVE",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stateless reading of a [`crate::deserializer::StateVector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVectorInterpreter {
    alignment_threshold: f64,
}

impl Default for StateVectorInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_ALIGNMENT_THRESHOLD)
    }
}

impl StateVectorInterpreter {
    /// Creates an interpreter with a custom alignment threshold.
    #[must_use]
    pub const fn new(alignment_threshold: f64) -> Self {
        Self {
            alignment_threshold,
        }
    }

    /// Threshold used by [`Self::is_aligned`].
    #[must_use]
    pub const fn alignment_threshold(&self) -> f64 {
        self.alignment_threshold
    }

    /// Alignment check against the configured threshold.
    #[must_use]
    pub fn is_aligned(&self, psi: f64) -> bool {
        is_intent_aligned(psi, self.alignment_threshold)
    }
}

/// Quadrant `0..=3` of the phase angle after flooring it into `[0, 2π)`.
#[must_use]
pub fn phase_quadrant(phi: f64) -> u8 {
    let normalized = phi.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quadrant = (normalized / FRAC_PI_2).floor() as u8;
    quadrant.min(3)
}

/// `psi >= threshold`; the boundary is aligned.
#[must_use]
pub fn is_intent_aligned(psi: f64, threshold: f64) -> bool {
    psi >= threshold
}

/// Buckets angular velocity. Non-comparable input falls through to hyperactive.
#[must_use]
pub fn activity_level(omega: f64) -> ActivityLevel {
    if omega < ACTIVE_OMEGA {
        ActivityLevel::Idle
    } else if omega < HYPERACTIVE_OMEGA {
        ActivityLevel::Active
    } else {
        ActivityLevel::Hyperactive
    }
}
