//! Typed error hierarchy for Cadence.
//!
//! Almost every "failure" in the controller and inspectors is a structured
//! result rather than an error. Two enums cover what remains:
//! - `ToneError`: the tone-fidelity embedding call (the only I/O seam)
//! - `ConfigError`: configuration loading and validation

use std::time::Duration;
use thiserror::Error;

/// Errors from the tone-fidelity embedding path.
///
/// These never reach the aggregator's caller: the tone inspector degrades
/// any of them to a score of 0 and logs a warning.
#[derive(Debug, Error)]
pub enum ToneError {
    #[error("Embedding request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Embedding backend failed: {0}")]
    Backend(String),

    #[error("Vector dimension mismatch: message has {actual}, reference voice has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding response was empty")]
    EmptyEmbedding,

    #[error("Embedding response contained a non-finite value at index {index}")]
    MalformedEmbedding { index: usize },

    #[error("Similarity is not a finite number: {0}")]
    NonFiniteSimilarity(f64),

    #[error("Embedding task panicked: {0}")]
    Panicked(String),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Threshold '{name}' must be within 0-100, got {value}")]
    ThresholdOutOfRange { name: String, value: f64 },

    #[error("Unknown phase '{0}' in [slots] table")]
    UnknownPhase(String),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("tone.reference_voice must have {expected} values, got {actual}")]
    ReferenceVoiceDimension { expected: usize, actual: usize },

    #[error("tone.reference_voice[{index}] is not a finite number: {value}")]
    ReferenceVoiceNotFinite { index: usize, value: f64 },

    #[error("Phase '{phase}' is listed twice in [slots] (as '{first}' and '{second}')")]
    DuplicatePhase {
        phase: String,
        first: String,
        second: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_error_timeout_reports_millis() {
        let err = ToneError::Timeout(Duration::from_millis(1500));
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn tone_error_dimension_mismatch_carries_sizes() {
        let err = ToneError::DimensionMismatch {
            expected: 8,
            actual: 3,
        };
        match &err {
            ToneError::DimensionMismatch { expected, actual } => {
                assert_eq!(*expected, 8);
                assert_eq!(*actual, 3);
            }
            _ => panic!("Expected DimensionMismatch"),
        }
        assert!(err.to_string().contains("reference voice has 8"));
    }

    #[test]
    fn tone_error_malformed_embedding_carries_index() {
        let err = ToneError::MalformedEmbedding { index: 4 };
        assert!(matches!(err, ToneError::MalformedEmbedding { index: 4 }));
        assert!(err.to_string().contains("index 4"));
    }

    #[test]
    fn config_error_reference_voice_dimension_carries_sizes() {
        let err = ConfigError::ReferenceVoiceDimension {
            expected: 8,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "tone.reference_voice must have 8 values, got 2"
        );
    }

    #[test]
    fn config_error_read_failed_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("/etc/cadence.toml");
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::ReadFailed {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            ConfigError::ReadFailed { path: p, source: s } => {
                assert_eq!(p, &path);
                assert_eq!(s.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected ReadFailed"),
        }
    }

    #[test]
    fn config_error_converts_from_toml_error() {
        let toml_err = toml::from_str::<toml::Table>("not = [valid").unwrap_err();
        let err: ConfigError = toml_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ToneError::EmptyEmbedding);
        assert_std_error(&ConfigError::UnknownPhase("x".into()));
    }
}
