//! Conversation phases and their canonical order.
//!
//! A session walks the non-terminal phases in a fixed linear order and
//! ends in [`Phase::Complete`]:
//!
//! 1. [`Phase::Rapport`] → 2. [`Phase::CurrentState`] → 3. [`Phase::Diagnostic`]
//!    → 4. [`Phase::Preview`] → 5. [`Phase::Complete`]
//!
//! ## Example
//!
//! ```
//! use cadence_common::Phase;
//!
//! let phase = Phase::default();
//! assert_eq!(phase, Phase::Rapport);
//! assert_eq!(phase.next(), Phase::CurrentState);
//! assert!(Phase::Complete.is_terminal());
//! assert_eq!(Phase::Complete.next(), Phase::Complete);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PhaseParseError;

/// A named step in the fixed conversation sequence.
///
/// Variants are declared in progression order, so the derived `Ord`
/// matches the order a session moves through them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Build trust; learn the student's context and motivation.
    #[default]
    Rapport,
    /// Map academics, activities and early signals.
    CurrentState,
    /// Deep analysis of aptitude, passion, service and narrative.
    Diagnostic,
    /// Strategic direction for the coming year.
    Preview,
    /// Terminal phase. No slots are required and no transition leaves it.
    Complete,
}

impl Phase {
    /// All phases in progression order, terminal last.
    pub const ALL: [Phase; 5] = [
        Phase::Rapport,
        Phase::CurrentState,
        Phase::Diagnostic,
        Phase::Preview,
        Phase::Complete,
    ];

    /// Get all phases in progression order.
    pub fn all() -> &'static [Phase] {
        &Self::ALL
    }

    /// Get the phase that follows this one.
    ///
    /// The terminal phase maps to itself so callers never step past it.
    ///
    /// # Examples
    ///
    /// ```
    /// use cadence_common::Phase;
    ///
    /// assert_eq!(Phase::Diagnostic.next(), Phase::Preview);
    /// assert_eq!(Phase::Preview.next(), Phase::Complete);
    /// ```
    pub fn next(&self) -> Phase {
        match self {
            Self::Rapport => Self::CurrentState,
            Self::CurrentState => Self::Diagnostic,
            Self::Diagnostic => Self::Preview,
            Self::Preview | Self::Complete => Self::Complete,
        }
    }

    /// Check if this is the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Zero-based position in the progression order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cadence_common::Phase;
    ///
    /// assert_eq!(Phase::Rapport.ordinal(), 0);
    /// assert_eq!(Phase::Complete.ordinal(), 4);
    /// ```
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Rapport => 0,
            Self::CurrentState => 1,
            Self::Diagnostic => 2,
            Self::Preview => 3,
            Self::Complete => 4,
        }
    }

    /// Wire name of the phase (snake_case, matches the serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rapport => "rapport",
            Self::CurrentState => "current_state",
            Self::Diagnostic => "diagnostic",
            Self::Preview => "preview",
            Self::Complete => "complete",
        }
    }

    /// Human-readable name for logs and status lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rapport => "Rapport",
            Self::CurrentState => "Current State",
            Self::Diagnostic => "Diagnostic",
            Self::Preview => "Preview",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a phase name.
///
/// Accepts the snake_case wire name, kebab-case and space-separated
/// spellings, case-insensitively.
///
/// # Examples
///
/// ```
/// use cadence_common::Phase;
///
/// assert_eq!("current_state".parse::<Phase>().unwrap(), Phase::CurrentState);
/// assert_eq!("Current-State".parse::<Phase>().unwrap(), Phase::CurrentState);
/// assert!("wrap_up".parse::<Phase>().is_err());
/// ```
impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "rapport" => Ok(Self::Rapport),
            "current_state" | "currentstate" => Ok(Self::CurrentState),
            "diagnostic" => Ok(Self::Diagnostic),
            "preview" => Ok(Self::Preview),
            "complete" | "completed" => Ok(Self::Complete),
            _ => Err(PhaseParseError::Unknown(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_follows_declared_order() {
        for window in Phase::ALL.windows(2) {
            assert_eq!(window[0].next(), window[1]);
        }
    }

    #[test]
    fn test_next_never_skips() {
        for phase in Phase::all() {
            let next = phase.next();
            if phase.is_terminal() {
                assert_eq!(next, *phase);
            } else {
                assert_eq!(next.ordinal(), phase.ordinal() + 1);
            }
        }
    }

    #[test]
    fn test_only_complete_is_terminal() {
        let terminal: Vec<_> = Phase::all().iter().filter(|p| p.is_terminal()).collect();
        assert_eq!(terminal, vec![&Phase::Complete]);
    }

    #[test]
    fn test_ordering_matches_ordinal() {
        assert!(Phase::Rapport < Phase::CurrentState);
        assert!(Phase::Preview < Phase::Complete);
        for (i, phase) in Phase::all().iter().enumerate() {
            assert_eq!(phase.ordinal(), i);
        }
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        for phase in Phase::all() {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), *phase);
        }
    }

    #[test]
    fn test_parse_unknown_phase() {
        let err = "intake".parse::<Phase>().unwrap_err();
        assert!(err.to_string().contains("intake"));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Phase::CurrentState).unwrap();
        assert_eq!(json, "\"current_state\"");
        let parsed: Phase = serde_json::from_str("\"preview\"").unwrap();
        assert_eq!(parsed, Phase::Preview);
    }
}
