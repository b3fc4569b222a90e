use std::io::{self, BufRead, Lines};

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;
use tracing::{debug, error};

/// Motion state carried by every token pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Corridor phase angle in radians, any range.
    pub phi: f64,
    /// Intent alignment in `[0, 1]`.
    pub psi: f64,
    /// Angular velocity.
    pub omega: f64,
    /// Time parameter, passed through untouched.
    pub tau: f64,
}

/// One timestamped telemetry entry for an agent tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPixel {
    /// Record identifier.
    pub token_pixel_id: String,
    /// Producer timestamp in seconds.
    pub timestamp: f64,
    /// Agent emitting the record.
    pub agent_id: String,
    /// Raw corridor address, e.g. `DISTRICT_1.CHAMBER_0.NODE_START`.
    pub corridor: String,
    /// Motion state.
    pub state_vector: StateVector,
    /// Opaque intent fingerprint.
    pub intent_hash: String,
    /// Opaque event-delta tag.
    pub event_delta: String,
    /// Drift proxy in `[0, 1]`.
    pub autonomy_index: f64,
    /// Occupancy signature holding a `0x` hex payload.
    pub voxel_signature: String,
    /// Hash of the previous record. Never verified.
    pub prev_hash: String,
    /// Hash of this record. Never verified.
    pub hash: String,
}

const SNIPPET_CHARS: usize = 50;

/// Reasons a non-blank line did not produce a [`TokenPixel`].
#[derive(Debug, Error)]
pub enum PixelParseError {
    /// The line is not valid JSON.
    #[error("Failed to decode JSON: {snippet}...")]
    Malformed {
        /// Leading characters of the offending line.
        snippet: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Valid JSON lacking a required field.
    #[error("Missing field in token pixel: {field}")]
    MissingField {
        /// Name of the absent field.
        field: String,
    },
    /// Valid JSON whose shape or field types do not match the schema.
    #[error("Invalid token pixel: {source}")]
    InvalidField {
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

impl PixelParseError {
    fn classify(line: &str, source: serde_json::Error) -> Self {
        match source.classify() {
            Category::Data => match missing_field_name(&source) {
                Some(field) => Self::MissingField { field },
                None => Self::InvalidField { source },
            },
            Category::Syntax | Category::Eof | Category::Io => Self::Malformed {
                snippet: line.chars().take(SNIPPET_CHARS).collect(),
                source,
            },
        }
    }
}

fn missing_field_name(err: &serde_json::Error) -> Option<String> {
    let message = err.to_string();
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Line-oriented token pixel parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPixelDeserializer;

impl TokenPixelDeserializer {
    /// Parses one line, reporting why a non-blank line was rejected.
    ///
    /// Blank and whitespace-only lines yield `Ok(None)`.
    pub fn try_parse(line: &str) -> Result<Option<TokenPixel>, PixelParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|err| PixelParseError::classify(line, err))
    }

    /// Parses one line, logging and swallowing any rejection.
    #[must_use]
    pub fn parse(line: &str) -> Option<TokenPixel> {
        match Self::try_parse(line) {
            Ok(pixel) => pixel,
            Err(err) => {
                error!("{err}");
                None
            }
        }
    }

    /// Lazily yields the pixels of a line source, skipping rejected lines.
    pub fn parse_stream<R: BufRead>(reader: R) -> PixelStream<R> {
        PixelStream {
            lines: reader.lines(),
            skipped: 0,
            finished: false,
        }
    }
}

/// Forward-only pixel iterator produced by [`TokenPixelDeserializer::parse_stream`].
#[derive(Debug)]
pub struct PixelStream<R> {
    lines: Lines<R>,
    skipped: usize,
    finished: bool,
}

impl<R> PixelStream<R> {
    /// Number of non-blank lines rejected so far.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for PixelStream<R> {
    type Item = TokenPixel;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) if err.kind() == io::ErrorKind::InvalidData => {
                    error!("Skipping undecodable line: {err}");
                    self.skipped += 1;
                    continue;
                }
                Some(Err(err)) => {
                    error!("Token pixel stream read failed: {err}");
                    self.finished = true;
                    return None;
                }
                None => {
                    debug!(skipped = self.skipped, "token pixel stream exhausted");
                    self.finished = true;
                    return None;
                }
            };
            match TokenPixelDeserializer::try_parse(&line) {
                Ok(Some(pixel)) => return Some(pixel),
                Ok(None) => {}
                Err(err) => {
                    error!("{err}");
                    self.skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::fixtures::{pixel_json, PixelTemplate};

    #[test]
    fn parses_complete_line() {
        let line = pixel_json(&PixelTemplate::default()).to_string();
        let pixel = TokenPixelDeserializer::parse(&line).unwrap();
        assert_eq!(pixel.token_pixel_id, "tp-0001");
        assert_eq!(pixel.agent_id, "agent-q");
        assert!((pixel.state_vector.psi - 0.9).abs() < f64::EPSILON);
        assert_eq!(pixel.prev_hash, "sha256:prev");
    }

    #[test]
    fn blank_lines_are_silent() {
        assert!(TokenPixelDeserializer::try_parse("   \t").unwrap().is_none());
        assert!(TokenPixelDeserializer::parse("").is_none());
    }

    #[test]
    fn malformed_text_is_rejected() {
        let err = TokenPixelDeserializer::try_parse("{\"tokenPixelId\": ").unwrap_err();
        assert!(matches!(err, PixelParseError::Malformed { .. }));
        assert!(err.to_string().starts_with("Failed to decode JSON: {\"tokenPixelId\""));
        assert!(TokenPixelDeserializer::parse("not json at all").is_none());
    }

    #[test]
    fn missing_autonomy_index_is_a_schema_error() {
        let mut value = pixel_json(&PixelTemplate::default());
        value.as_object_mut().unwrap().remove("autonomyIndex");
        let err = TokenPixelDeserializer::try_parse(&value.to_string()).unwrap_err();
        match err {
            PixelParseError::MissingField { field } => assert_eq!(field, "autonomyIndex"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(TokenPixelDeserializer::parse(&value.to_string()).is_none());
    }

    #[test]
    fn mistyped_field_is_a_schema_error() {
        let mut value = pixel_json(&PixelTemplate::default());
        value["timestamp"] = serde_json::json!("yesterday");
        let err = TokenPixelDeserializer::try_parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, PixelParseError::InvalidField { .. }));
    }

    #[test]
    fn stream_skips_rejected_lines_in_order() {
        let first = pixel_json(&PixelTemplate {
            id: "a",
            ..PixelTemplate::default()
        });
        let second = pixel_json(&PixelTemplate {
            id: "b",
            ..PixelTemplate::default()
        });
        let input = format!("{first}\n\n{{broken\n{second}\n");
        let mut stream = TokenPixelDeserializer::parse_stream(Cursor::new(input));
        assert_eq!(stream.next().unwrap().token_pixel_id, "a");
        assert_eq!(stream.next().unwrap().token_pixel_id, "b");
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.skipped(), 1);
    }

    #[test]
    fn stream_skips_undecodable_bytes() {
        let line = |id| {
            let template = PixelTemplate {
                id,
                ..PixelTemplate::default()
            };
            format!("{}\n", pixel_json(&template))
        };
        let mut input = line("a").into_bytes();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(line("b").as_bytes());
        let mut stream = TokenPixelDeserializer::parse_stream(Cursor::new(input));
        assert_eq!(stream.next().unwrap().token_pixel_id, "a");
        assert_eq!(stream.next().unwrap().token_pixel_id, "b");
        assert!(stream.next().is_none());
        assert_eq!(stream.skipped(), 1);
    }
}
