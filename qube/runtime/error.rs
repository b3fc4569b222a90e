use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while assembling the runtime.
///
/// Per-record faults never show up here; they degrade to safe defaults.
#[derive(Debug, Error)]
pub enum QubeError {
    /// A configuration file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A configuration file was not valid JSON for [`crate::config::QubeConfig`].
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        /// File that was requested.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// The configuration was well formed but inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Telemetry sinks could not be opened.
    #[error("telemetry unavailable: {0}")]
    Telemetry(String),
}
