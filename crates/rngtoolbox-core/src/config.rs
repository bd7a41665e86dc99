//! Persisted session configuration.
//!
//! The record is stored as a camelCase JSON object. Every field is optional on
//! disk so that partial or older files still load; missing fields take their
//! defaults. Key names written by earlier releases (`port`, `outputDest`,
//! `numSamples`) are accepted as aliases.

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, ValidationError};

/// Literal sample count meaning "stream until cancelled".
pub const UNBOUNDED_SAMPLES: &str = "*";

/// Where collected samples go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDestination {
    /// Stream every sample into the session's visible output.
    #[default]
    Screen,
    /// Write samples to `file_path`, reporting progress only.
    File,
    /// Discard samples.
    None,
}

impl OutputDestination {
    pub const ALL: [OutputDestination; 3] = [Self::Screen, Self::File, Self::None];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::File => "file",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

impl std::fmt::Display for OutputDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one acquisition session, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Source device identifier (serial port path, or a virtual source name).
    #[serde(alias = "port")]
    pub source_port: Option<String>,
    /// Baud rate as typed; empty means unset.
    pub baud_rate: String,
    #[serde(alias = "outputDest")]
    pub output_destination: OutputDestination,
    /// A decimal count, or `"*"` for an unbounded stream.
    #[serde(alias = "numSamples")]
    pub sample_count: String,
    /// Required iff `output_destination` is `file`.
    pub file_path: String,
    pub conditioner_id: String,
    pub remote_fetch_endpoint: Option<String>,
    /// Route samples into the OS entropy pool. Only meaningful when
    /// `sample_count` is `"*"`.
    pub entropy_direct: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_port: None,
            baud_rate: String::new(),
            output_destination: OutputDestination::Screen,
            sample_count: String::new(),
            file_path: String::new(),
            conditioner_id: "none".to_string(),
            remote_fetch_endpoint: None,
            entropy_direct: false,
        }
    }
}

impl SessionConfig {
    /// Minimal checks made before a request is issued.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_source = self
            .source_port
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if !has_source {
            return Err(ValidationError::MissingSource);
        }
        if self.output_destination == OutputDestination::File && self.file_path.trim().is_empty() {
            return Err(ValidationError::MissingFilePath);
        }
        Ok(())
    }

    pub fn is_unbounded(&self) -> bool {
        self.sample_count.trim() == UNBOUNDED_SAMPLES
    }

    /// Entropy-direct routing applies only to unbounded streams.
    pub fn routes_to_entropy_pool(&self) -> bool {
        self.entropy_direct && self.is_unbounded()
    }

    pub fn has_remote_endpoint(&self) -> bool {
        self.remote_fetch_endpoint
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }
}

/// Parsed form of [`SessionConfig::sample_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLimit {
    Count(u64),
    Unbounded,
}

impl SampleLimit {
    pub fn parse(s: &str) -> Result<Self, TransportError> {
        let s = s.trim();
        if s == UNBOUNDED_SAMPLES {
            return Ok(Self::Unbounded);
        }
        s.parse::<u64>()
            .map(Self::Count)
            .map_err(|_| TransportError::new("Invalid sample count"))
    }

    pub fn reached(self, done: u64) -> bool {
        match self {
            Self::Count(n) => done >= n,
            Self::Unbounded => false,
        }
    }

    /// Progress after `done` samples. Unbounded streams never progress.
    pub fn percent(self, done: u64) -> f64 {
        match self {
            Self::Count(0) | Self::Unbounded => 0.0,
            Self::Count(n) => done as f64 / n as f64 * 100.0,
        }
    }

    /// Completed whole percentage points, free of float rounding.
    pub fn whole_percent(self, done: u64) -> u64 {
        match self {
            Self::Count(0) | Self::Unbounded => 0,
            Self::Count(n) => done.min(n).saturating_mul(100) / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_source(port: &str) -> SessionConfig {
        SessionConfig {
            source_port: Some(port.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn default_serializes_to_documented_record() {
        let json = serde_json::to_value(SessionConfig::default()).unwrap();
        assert_eq!(json["sourcePort"], serde_json::Value::Null);
        assert_eq!(json["baudRate"], "");
        assert_eq!(json["outputDestination"], "screen");
        assert_eq!(json["sampleCount"], "");
        assert_eq!(json["conditionerId"], "none");
        assert_eq!(json["entropyDirect"], false);
    }

    #[test]
    fn partial_record_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"sourcePort":"/dev/ttyUSB0","baudRate":"9600"}"#).unwrap();
        assert_eq!(config.source_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, "9600");
        assert_eq!(config.output_destination, OutputDestination::Screen);
        assert_eq!(config.conditioner_id, "none");
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"port":"COM3","baudRate":"115200","outputDest":"file","numSamples":"1000"}"#,
        )
        .unwrap();
        assert_eq!(config.source_port.as_deref(), Some("COM3"));
        assert_eq!(config.output_destination, OutputDestination::File);
        assert_eq!(config.sample_count, "1000");
    }

    #[test]
    fn validate_requires_source() {
        assert_eq!(
            SessionConfig::default().validate(),
            Err(ValidationError::MissingSource)
        );
        assert_eq!(
            with_source("  ").validate(),
            Err(ValidationError::MissingSource)
        );
        assert!(with_source("/dev/ttyACM0").validate().is_ok());
    }

    #[test]
    fn validate_requires_file_path_for_file_output() {
        let mut config = with_source("/dev/ttyACM0");
        config.output_destination = OutputDestination::File;
        assert_eq!(config.validate(), Err(ValidationError::MissingFilePath));

        config.file_path = "out.txt".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_source_reported_before_missing_path() {
        let config = SessionConfig {
            output_destination: OutputDestination::File,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::MissingSource));
    }

    #[test]
    fn entropy_direct_only_for_unbounded() {
        let mut config = with_source("OS Entropy Pool");
        config.entropy_direct = true;
        config.sample_count = "100".to_string();
        assert!(!config.routes_to_entropy_pool());
        config.sample_count = "*".to_string();
        assert!(config.routes_to_entropy_pool());
    }

    #[test]
    fn sample_limit_parsing() {
        assert_eq!(SampleLimit::parse("250").unwrap(), SampleLimit::Count(250));
        assert_eq!(SampleLimit::parse(" * ").unwrap(), SampleLimit::Unbounded);
        assert_eq!(
            SampleLimit::parse("").unwrap_err().message(),
            "Invalid sample count"
        );
        assert!(SampleLimit::parse("-4").is_err());
        assert!(SampleLimit::parse("ten").is_err());
    }

    #[test]
    fn sample_limit_progress() {
        let limit = SampleLimit::Count(4);
        assert_eq!(limit.percent(1), 25.0);
        assert_eq!(limit.percent(4), 100.0);
        assert!(limit.reached(4));
        assert!(!limit.reached(3));
        assert_eq!(SampleLimit::Count(0).percent(0), 0.0);
        assert!(SampleLimit::Count(0).reached(0));
        assert_eq!(SampleLimit::Unbounded.percent(1_000), 0.0);
        assert!(!SampleLimit::Unbounded.reached(u64::MAX));
        assert_eq!(SampleLimit::Count(3).whole_percent(1), 33);
        assert_eq!(SampleLimit::Count(3).whole_percent(3), 100);
        assert_eq!(SampleLimit::Unbounded.whole_percent(5), 0);
    }

    #[test]
    fn output_destination_parse() {
        assert_eq!(OutputDestination::parse("file"), Some(OutputDestination::File));
        assert_eq!(OutputDestination::parse("printer"), None);
        assert_eq!(OutputDestination::None.to_string(), "none");
    }
}
