//! Progress toward closing the current phase.
//!
//! Progress is measured from the event alone: extracted-slot count over
//! required-slot count. The caller keeps these in agreement with the
//! session controller.

use cadence_common::Phase;
use serde::{Deserialize, Serialize};

use crate::telemetry::event::TelemetryEvent;
use crate::telemetry::flags::TelemetryFlag;

/// Assumed number of required slots when an event does not list them.
pub const DEFAULT_PHASE_SIZE: usize = 5;

/// Turn number from which zero collected slots counts as stalled.
pub const DEFAULT_STALL_TURN: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDetails {
    pub collected_slots: usize,
    pub required_slots: usize,
    /// Zero when the event lists no required slots.
    pub percent_complete: f64,
    /// Required slots absent from the extracted list, in required order.
    pub missing_slots: Vec<String>,
    pub stalled: bool,
}

/// Score and details from one progress inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub score: u8,
    pub details: ProgressDetails,
}

impl ProgressReport {
    pub fn flags(&self) -> Vec<TelemetryFlag> {
        if self.details.stalled {
            vec![TelemetryFlag::StalledConversation]
        } else {
            Vec::new()
        }
    }
}

/// Velocity of slot collection over a recent window of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressVelocity {
    /// Mean slots per turn over the window.
    pub velocity: f64,
    /// Second-half mean minus first-half mean of the window.
    pub acceleration: f64,
    /// `None` when nothing is being collected.
    pub predicted_turns_to_complete: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressInspector {
    default_phase_size: usize,
    stall_turn: u32,
}

impl Default for ProgressInspector {
    fn default() -> Self {
        Self {
            default_phase_size: DEFAULT_PHASE_SIZE,
            stall_turn: DEFAULT_STALL_TURN,
        }
    }
}

impl ProgressInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is ignored; a phase always has at least one assumed slot.
    pub fn with_default_phase_size(mut self, size: usize) -> Self {
        self.default_phase_size = size.max(1);
        self
    }

    pub fn with_stall_turn(mut self, turn: u32) -> Self {
        self.stall_turn = turn;
        self
    }

    pub fn default_phase_size(&self) -> usize {
        self.default_phase_size
    }

    pub fn stall_turn(&self) -> u32 {
        self.stall_turn
    }

    pub fn inspect(&self, event: &TelemetryEvent) -> ProgressReport {
        let collected = event.extracted_slots.len();
        let required = event.required_slots.len();
        let denominator = if required == 0 {
            self.default_phase_size
        } else {
            required
        };

        let ratio = collected as f64 / denominator as f64 * 100.0;
        let score = ratio.min(100.0).floor() as u8;

        let percent_complete = if required > 0 {
            collected as f64 / required as f64 * 100.0
        } else {
            0.0
        };

        let missing_slots = event
            .required_slots
            .iter()
            .filter(|slot| !event.extracted_slots.contains(slot))
            .cloned()
            .collect();

        let stalled = event
            .turn_number
            .is_some_and(|turn| turn >= self.stall_turn && collected == 0);

        ProgressReport {
            score,
            details: ProgressDetails {
                collected_slots: collected,
                required_slots: required,
                percent_complete,
                missing_slots,
                stalled,
            },
        }
    }

    /// Expected slots collected by `turn`, assuming linear progress across
    /// the phase's typical turn budget.
    pub fn expected_progress(&self, phase: Phase, turn: u32) -> f64 {
        let size = self.default_phase_size as f64;
        (f64::from(turn) / f64::from(typical_max_turns(phase)) * size).min(size)
    }

    /// Velocity of collection over the last `window` entries of
    /// `slot_history` (slots collected per turn).
    pub fn progress_velocity(&self, slot_history: &[usize], window: usize) -> ProgressVelocity {
        let start = slot_history.len().saturating_sub(window.max(1));
        let recent = &slot_history[start..];
        if recent.is_empty() {
            return ProgressVelocity {
                velocity: 0.0,
                acceleration: 0.0,
                predicted_turns_to_complete: None,
            };
        }

        let total: usize = recent.iter().sum();
        let velocity = total as f64 / recent.len() as f64;

        let acceleration = if recent.len() >= 2 {
            let (first, second) = recent.split_at(recent.len() / 2);
            average(second) - average(first)
        } else {
            0.0
        };

        let remaining = self.default_phase_size.saturating_sub(total) as f64;
        let predicted_turns_to_complete = (velocity > 0.0).then(|| remaining / velocity);

        ProgressVelocity {
            velocity,
            acceleration,
            predicted_turns_to_complete,
        }
    }
}

/// Upper end of the usual turn count spent in each phase.
fn typical_max_turns(phase: Phase) -> u32 {
    match phase {
        Phase::Rapport => 4,
        Phase::CurrentState => 8,
        Phase::Diagnostic => 6,
        Phase::Preview => 4,
        Phase::Complete => 6,
    }
}

fn average(values: &[usize]) -> f64 {
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

/// Slots per turn; zero when there have been no turns.
pub fn turn_efficiency(total_slots: usize, total_turns: u32) -> f64 {
    if total_turns == 0 {
        return 0.0;
    }
    total_slots as f64 / f64::from(total_turns)
}

/// True when each of the last `window` turns collected nothing. Needs at
/// least `window` turns of history.
pub fn detect_stalling(recent_slots: &[usize], window: usize) -> bool {
    if window == 0 || recent_slots.len() < window {
        return false;
    }
    recent_slots[recent_slots.len() - window..]
        .iter()
        .all(|&count| count == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(extracted: &[&str], required: &[&str]) -> TelemetryEvent {
        TelemetryEvent::new("progress-test", Phase::Rapport)
            .with_extracted_slots(extracted.iter().copied())
            .with_required_slots(required.iter().copied())
    }

    // =========================================
    // Scoring
    // =========================================

    #[test]
    fn test_progress_ratios() {
        let inspector = ProgressInspector::new();
        assert_eq!(inspector.inspect(&event(&[], &["a", "b", "c"])).score, 0);
        assert_eq!(inspector.inspect(&event(&["a"], &["a", "b"])).score, 50);
        assert_eq!(inspector.inspect(&event(&["a", "b", "c"], &["a", "b", "c"])).score, 100);
    }

    #[test]
    fn test_score_capped_at_100() {
        let report = ProgressInspector::new().inspect(&event(&["a", "b", "x"], &["a", "b"]));
        assert_eq!(report.score, 100);
        assert_eq!(report.details.percent_complete, 150.0);
    }

    #[test]
    fn test_missing_required_uses_phase_size() {
        let report = ProgressInspector::new().inspect(&event(&["a", "b"], &[]));
        assert_eq!(report.score, 40);
        assert_eq!(report.details.percent_complete, 0.0);

        let report = ProgressInspector::new()
            .with_default_phase_size(4)
            .inspect(&event(&["a"], &[]));
        assert_eq!(report.score, 25);
    }

    #[test]
    fn test_missing_slots_listed() {
        let report = ProgressInspector::new().inspect(&event(&["b"], &["a", "b", "c"]));
        assert_eq!(report.details.missing_slots, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.score, 33);
    }

    // =========================================
    // Stalling
    // =========================================

    #[test]
    fn test_stalled_from_turn_five() {
        let inspector = ProgressInspector::new();
        let stalled = inspector.inspect(&event(&[], &["a"]).with_turn_number(5));
        assert_eq!(stalled.flags(), vec![TelemetryFlag::StalledConversation]);

        let early = inspector.inspect(&event(&[], &["a"]).with_turn_number(3));
        assert!(early.flags().is_empty());

        let collecting = inspector.inspect(&event(&["a"], &["a", "b"]).with_turn_number(9));
        assert!(collecting.flags().is_empty());
    }

    #[test]
    fn test_no_turn_number_never_stalls() {
        let report = ProgressInspector::new().inspect(&event(&[], &["a"]));
        assert!(!report.details.stalled);
    }

    #[test]
    fn test_detect_stalling_window() {
        assert!(!detect_stalling(&[0, 0], 3));
        assert!(detect_stalling(&[2, 0, 0, 0], 3));
        assert!(!detect_stalling(&[0, 0, 1], 3));
        assert!(!detect_stalling(&[0, 0, 0], 0));
    }

    // =========================================
    // Helpers
    // =========================================

    #[test]
    fn test_turn_efficiency() {
        assert_eq!(turn_efficiency(6, 4), 1.5);
        assert_eq!(turn_efficiency(3, 0), 0.0);
    }

    #[test]
    fn test_expected_progress() {
        let inspector = ProgressInspector::new();
        assert_eq!(inspector.expected_progress(Phase::Rapport, 2), 2.5);
        assert_eq!(inspector.expected_progress(Phase::CurrentState, 4), 2.5);
        assert_eq!(inspector.expected_progress(Phase::Preview, 40), 5.0);
    }

    #[test]
    fn test_progress_velocity() {
        let inspector = ProgressInspector::new();
        let v = inspector.progress_velocity(&[0, 0, 1, 1], 4);
        assert_eq!(v.velocity, 0.5);
        assert_eq!(v.acceleration, 1.0);
        assert_eq!(v.predicted_turns_to_complete, Some(6.0));

        let v = inspector.progress_velocity(&[3, 0, 0], 2);
        assert_eq!(v.velocity, 0.0);
        assert!(v.predicted_turns_to_complete.is_none());

        let v = inspector.progress_velocity(&[], 5);
        assert_eq!(v.velocity, 0.0);
    }
}
