#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Qube edge runtime ("Agent Q"): turns a stream of token pixels into one
//! safety-first control decision per pixel.

/// Token pixel records and the line deserializer.
#[path = "../deserializer.rs"]
pub mod deserializer;

/// Phase, alignment, and activity derived from the state vector.
#[path = "../interpreter.rs"]
pub mod interpreter;

/// Corridor parsing and adjacency lookups.
#[path = "../corridor.rs"]
pub mod corridor;

/// Voxel occupancy decoding and collision probes.
#[path = "../voxel.rs"]
pub mod voxel;

/// Intent fingerprint labels.
#[path = "../intent.rs"]
pub mod intent;

/// Autonomy drift classification.
#[path = "../drift.rs"]
pub mod drift;

/// The precedence-ordered decision rule.
#[path = "../decision/main.rs"]
pub mod decision;

/// Action registry and executor.
#[path = "../executor.rs"]
pub mod executor;

/// Configuration and stock lookup tables.
#[path = "../config.rs"]
pub mod config;

/// Runtime error type.
#[path = "../error.rs"]
pub mod error;

/// Structured audit telemetry.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Per-pixel orchestration and stream driving.
#[path = "../main.rs"]
pub mod orchestration_entry;

#[cfg(test)]
#[path = "../fixtures.rs"]
mod fixtures;

pub use config::QubeConfig;
pub use corridor::{Corridor, CorridorGraph, CorridorNavigator};
pub use decision::command::{ActionCommand, ActionError, ActionKind, ActionParams};
pub use decision::{decide, Decision, DecisionContext, DecisionRule};
pub use deserializer::{PixelParseError, PixelStream, StateVector, TokenPixel, TokenPixelDeserializer};
pub use drift::{AutonomyDriftMonitor, DriftStatus, DriftThresholds};
pub use error::QubeError;
pub use executor::{ActionEntry, ActionExecutor, ActionHandler, ActionRegistry, ActionResult};
pub use intent::{IntentDatabase, IntentMatcher};
pub use interpreter::{ActivityLevel, StateVectorInterpreter};
pub use orchestration_entry::{DecisionLog, DecisionLogEntry, QubeRuntime, RunMode, RunSummary};
pub use telemetry::{RuntimeTelemetry, RuntimeTelemetryBuilder};
pub use voxel::{Direction, VoxelCollisionDetector};
