//! Structured results returned by controller operations.
//!
//! None of these are errors: a refused transition or an already-collected
//! slot is an expected outcome the orchestrator acts on.

use cadence_common::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of marking a slot as collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCollection {
    pub slot: String,
    /// True when the slot was already present; nothing was mutated.
    pub already_collected: bool,
    /// True when the slot is one the current phase requires.
    pub counts_toward_phase: bool,
}

/// Why a transition attempt ended the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransitionReason {
    /// All required slots were present; the session moved on.
    Advanced,
    /// The session is already in the terminal phase.
    Terminal,
    /// Required slots are still missing.
    Incomplete { missing: usize },
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advanced => write!(f, "phase complete, transitioned"),
            Self::Terminal => write!(f, "terminal"),
            Self::Incomplete { missing } => {
                write!(f, "phase not complete: missing {} slots", missing)
            }
        }
    }
}

/// Result of [`try_advance`](super::SessionProgressionController::try_advance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub transitioned: bool,
    pub from: Phase,
    pub to: Phase,
    /// Required slots still missing; empty unless the phase was incomplete.
    pub missing_slots: Vec<String>,
    pub reason: TransitionReason,
}

impl TransitionResult {
    pub(crate) fn advanced(from: Phase, to: Phase) -> Self {
        Self {
            transitioned: true,
            from,
            to,
            missing_slots: Vec::new(),
            reason: TransitionReason::Advanced,
        }
    }

    pub(crate) fn terminal(phase: Phase) -> Self {
        Self {
            transitioned: false,
            from: phase,
            to: phase,
            missing_slots: Vec::new(),
            reason: TransitionReason::Terminal,
        }
    }

    pub(crate) fn incomplete(phase: Phase, missing_slots: Vec<String>) -> Self {
        Self {
            transitioned: false,
            from: phase,
            to: phase,
            reason: TransitionReason::Incomplete {
                missing: missing_slots.len(),
            },
            missing_slots,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.reason, TransitionReason::Terminal)
    }
}

/// One violated invariant reported by
/// [`validate`](super::SessionProgressionController::validate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationIssue {
    /// The catalog has no entry for the current phase.
    UnknownPhase { phase: Phase },
    /// `required_slots` differs from the catalog's set for the phase.
    RequiredSlotsMismatch { phase: Phase },
    /// A collected slot is not in any phase's vocabulary.
    UnknownCollectedSlot { slot: String },
    /// A history entry is missing its role or content.
    IncompleteHistoryEntry { index: usize },
    /// The phase history does not end in one open entry for the current phase.
    PhaseHistoryInconsistent,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPhase { phase } => write!(f, "invalid phase: {}", phase),
            Self::RequiredSlotsMismatch { phase } => {
                write!(f, "required slots don't match phase requirements for {}", phase)
            }
            Self::UnknownCollectedSlot { slot } => write!(f, "invalid collected slot: {}", slot),
            Self::IncompleteHistoryEntry { index } => {
                write!(f, "history entry {} missing role or content", index)
            }
            Self::PhaseHistoryInconsistent => {
                write!(f, "phase history does not end in an open entry for the current phase")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_counts_missing() {
        let result = TransitionResult::incomplete(Phase::Rapport, vec!["a".into(), "b".into()]);
        assert!(!result.transitioned);
        assert_eq!(result.reason, TransitionReason::Incomplete { missing: 2 });
        assert_eq!(result.reason.to_string(), "phase not complete: missing 2 slots");
    }

    #[test]
    fn test_terminal_is_noop_shape() {
        let result = TransitionResult::terminal(Phase::Complete);
        assert!(result.is_terminal());
        assert_eq!(result.from, result.to);
        assert!(result.missing_slots.is_empty());
    }

    #[test]
    fn test_reason_serializes_tagged() {
        let json = serde_json::to_string(&TransitionReason::Incomplete { missing: 1 }).unwrap();
        assert_eq!(json, r#"{"kind":"incomplete","missing":1}"#);
    }
}
