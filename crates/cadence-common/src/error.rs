//! Error types for the shared vocabulary.

use thiserror::Error;

/// Failure to parse a phase name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseParseError {
    #[error("Unknown phase '{0}'. Valid values: rapport, current_state, diagnostic, preview, complete")]
    Unknown(String),
}
