use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord};

use crate::error::QubeError;

/// Builder for runtime telemetry sinks.
#[derive(Debug)]
pub struct RuntimeTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
}

impl RuntimeTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
        }
    }

    /// Sets the JSON-lines audit path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<RuntimeTelemetry, QubeError> {
        let logger = match self.log_path {
            Some(path) => Some(
                JsonLogger::new(&path)
                    .map_err(|err| QubeError::Telemetry(format!("{}: {err}", path.display())))?,
            ),
            None => None,
        };
        Ok(RuntimeTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
            }),
        })
    }
}

/// Structured audit handle shared by runtime components.
#[derive(Clone)]
pub struct RuntimeTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for RuntimeTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeTelemetry")
            .field("module", &self.inner.module)
            .field("recording", &self.is_recording())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
}

impl RuntimeTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> RuntimeTelemetryBuilder {
        RuntimeTelemetryBuilder::new(module)
    }

    /// Whether records are persisted anywhere.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.inner.logger.is_some()
    }

    /// Records written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.inner.logger.as_ref().map_or(0, JsonLogger::written)
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_records() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("audit/q.log.jsonl");
        let telemetry = RuntimeTelemetry::builder("q").log_path(&path).build().unwrap();
        telemetry
            .log(LogLevel::Info, "qube.pixel.decided", json!({ "pixel_id": "tp-1" }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("qube.pixel.decided"));
        assert!(content.contains("\"pixel_id\":\"tp-1\""));
        assert_eq!(telemetry.written(), 1);
    }

    #[test]
    fn telemetry_without_sink_is_a_no_op() {
        let telemetry = RuntimeTelemetry::builder("q").build().unwrap();
        assert!(!telemetry.is_recording());
        telemetry
            .log(LogLevel::Warn, "ignored", json!({}))
            .unwrap();
        assert_eq!(telemetry.written(), 0);
    }
}
