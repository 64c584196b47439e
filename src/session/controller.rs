//! Slot-gated phase progression.
//!
//! The controller guarantees a session cannot skip phases: the only way
//! out of a phase is [`try_advance`](SessionProgressionController::try_advance),
//! which moves exactly one step forward and only once every required slot
//! of the current phase has been collected.
//!
//! ## Example
//!
//! ```
//! use cadence::session::SessionProgressionController;
//! use cadence_common::Phase;
//!
//! let mut controller = SessionProgressionController::new();
//! controller.append_turn("student", "Hi, I'm a junior and pretty stressed.");
//!
//! // Not enough collected yet: refused, with the gaps listed.
//! let result = controller.try_advance();
//! assert!(!result.transitioned);
//! assert_eq!(result.missing_slots.len(), 3);
//!
//! controller.mark_slots_collected(["student_background", "emotional_state", "motivation_reason"]);
//! let result = controller.try_advance();
//! assert!(result.transitioned);
//! assert_eq!(controller.phase(), Phase::CurrentState);
//! assert!(controller.collected_slots().is_empty());
//! ```

use std::sync::Arc;

use cadence_common::{Phase, SlotCatalog, Turn};
use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::outcome::{SlotCollection, TransitionResult, ValidationIssue};
use super::state::{SessionMetadata, SessionSnapshot, SessionState};

/// Per-session phase state machine.
///
/// Owns its state and metadata exclusively; the slot catalog is shared
/// read-only between controllers.
#[derive(Debug, Clone)]
pub struct SessionProgressionController {
    catalog: Arc<SlotCatalog>,
    state: SessionState,
    metadata: SessionMetadata,
}

impl SessionProgressionController {
    /// Create a controller over the canonical slot catalog.
    pub fn new() -> Self {
        Self::with_catalog(Arc::new(SlotCatalog::canonical()))
    }

    /// Create a controller over an injected slot catalog.
    pub fn with_catalog(catalog: Arc<SlotCatalog>) -> Self {
        let state = SessionState::initial(&catalog);
        let metadata = SessionMetadata::new(Utc::now());
        debug!(phase = %state.current_phase, "Session controller initialized");
        Self {
            catalog,
            state,
            metadata,
        }
    }

    /// Use a caller-chosen session id instead of a generated one.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.metadata.session_id = session_id.into();
        self
    }

    /// Rebuild a controller from a persisted snapshot.
    ///
    /// The snapshot is taken as-is. Inconsistencies (for example a slot
    /// catalog that changed since the snapshot was written) are reported by
    /// [`validate`](Self::validate), never silently repaired.
    pub fn restore(snapshot: SessionSnapshot, catalog: Arc<SlotCatalog>) -> Self {
        debug!(
            phase = %snapshot.state.current_phase,
            turns = snapshot.metadata.total_turns,
            "Session controller restored from snapshot"
        );
        Self {
            catalog,
            state: snapshot.state,
            metadata: snapshot.metadata,
        }
    }

    /// Capture state and metadata for a storage layer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Append a message to the turn history.
    ///
    /// Content is not validated and recording a turn never affects
    /// progression.
    pub fn append_turn(&mut self, role: impl Into<String>, content: impl Into<String>) {
        let turn = Turn::new(role, content);
        self.metadata.total_turns += 1;
        self.metadata.last_updated = Utc::now();
        debug!(
            role = %turn.role,
            turn = self.metadata.total_turns,
            "Appended turn"
        );
        self.state.turn_history.push(turn);
    }

    /// Mark a slot as collected for the current phase.
    ///
    /// Idempotent: a slot already present is reported as
    /// `already_collected` and nothing changes. Slots the current phase
    /// does not require are still recorded, but never count toward
    /// completing the phase.
    pub fn mark_slot_collected(&mut self, slot: &str) -> SlotCollection {
        let counts_toward_phase = self.state.required_slots.iter().any(|s| s == slot);

        if self.state.has_collected(slot) {
            return SlotCollection {
                slot: slot.to_string(),
                already_collected: true,
                counts_toward_phase,
            };
        }

        self.state.collected_slots.push(slot.to_string());
        self.metadata.last_updated = Utc::now();
        debug!(
            slot,
            counts_toward_phase,
            collected = self.collected_required_count(),
            required = self.state.required_slots.len(),
            "Collected slot"
        );

        SlotCollection {
            slot: slot.to_string(),
            already_collected: false,
            counts_toward_phase,
        }
    }

    /// Mark several slots at once, one result per slot in input order.
    pub fn mark_slots_collected<I, S>(&mut self, slots: I) -> Vec<SlotCollection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        slots
            .into_iter()
            .map(|slot| self.mark_slot_collected(slot.as_ref()))
            .collect()
    }

    /// Check if every required slot of the current phase has been collected.
    pub fn is_phase_complete(&self) -> bool {
        self.state
            .required_slots
            .iter()
            .all(|slot| self.state.has_collected(slot))
    }

    /// Attempt to move to the next phase.
    ///
    /// - Terminal phase: no-op, reason `Terminal`.
    /// - Incomplete phase: no-op, with the missing slots.
    /// - Complete phase: moves exactly one step forward, clears the
    ///   collected slots, loads the new phase's required slots and rolls
    ///   the phase history.
    ///
    /// Slots are phase-scoped: a name reused by a later phase must be
    /// collected again.
    pub fn try_advance(&mut self) -> TransitionResult {
        let from = self.state.current_phase;

        if from.is_terminal() {
            return TransitionResult::terminal(from);
        }

        if !self.is_phase_complete() {
            let missing = self.state.missing_slots();
            debug!(
                phase = %from,
                missing = missing.len(),
                "Transition refused, phase incomplete"
            );
            return TransitionResult::incomplete(from, missing);
        }

        let to = from.next();
        let now = Utc::now();

        self.state.current_phase = to;
        self.state.required_slots = self.catalog.required_slots(to).to_vec();
        self.state.collected_slots.clear();
        self.metadata.record_transition(to, now);

        info!(
            from = %from,
            to = %to,
            required = ?self.state.required_slots,
            "Phase transition"
        );

        TransitionResult::advanced(from, to)
    }

    /// Fraction of the current phase's required slots collected, in `[0, 1]`.
    ///
    /// Defined as 1.0 when nothing is required (the terminal phase).
    pub fn progress_fraction(&self) -> f64 {
        let required = self.state.required_slots.len();
        if required == 0 {
            return 1.0;
        }
        self.collected_required_count() as f64 / required as f64
    }

    /// Consistency self-check.
    ///
    /// Returns every violated invariant; an empty list means the state is
    /// consistent. Never called automatically and never corrects anything.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let phase = self.state.current_phase;

        if !self.catalog.contains(phase) {
            issues.push(ValidationIssue::UnknownPhase { phase });
        }

        let mut expected = self.catalog.required_slots(phase).to_vec();
        let mut actual = self.state.required_slots.clone();
        expected.sort();
        actual.sort();
        if expected != actual {
            issues.push(ValidationIssue::RequiredSlotsMismatch { phase });
        }

        for slot in &self.state.collected_slots {
            if !self.catalog.is_known_slot(slot) {
                issues.push(ValidationIssue::UnknownCollectedSlot { slot: slot.clone() });
            }
        }

        for (index, turn) in self.state.turn_history.iter().enumerate() {
            if !turn.is_well_formed() {
                issues.push(ValidationIssue::IncompleteHistoryEntry { index });
            }
        }

        let open_entries = self
            .metadata
            .phase_history
            .iter()
            .filter(|e| e.is_open())
            .count();
        let last_matches = self
            .metadata
            .open_entry()
            .is_some_and(|e| e.phase == phase);
        if open_entries != 1 || !last_matches {
            issues.push(ValidationIssue::PhaseHistoryInconsistent);
        }

        issues
    }

    /// Return to the initial state. Intended for session restarts and tests.
    ///
    /// The session id is kept.
    pub fn reset(&mut self) {
        let session_id = std::mem::take(&mut self.metadata.session_id);
        self.state = SessionState::initial(&self.catalog);
        self.metadata = SessionMetadata::new(Utc::now());
        self.metadata.session_id = session_id;
        info!(session_id = %self.metadata.session_id, "Session controller reset to initial state");
    }

    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.current_phase
    }

    /// Check if the session reached the terminal phase.
    pub fn is_complete(&self) -> bool {
        self.state.current_phase.is_terminal()
    }

    pub fn required_slots(&self) -> &[String] {
        &self.state.required_slots
    }

    pub fn collected_slots(&self) -> &[String] {
        &self.state.collected_slots
    }

    pub fn missing_slots(&self) -> Vec<String> {
        self.state.missing_slots()
    }

    pub fn history(&self) -> &[Turn] {
        &self.state.turn_history
    }

    pub fn turn_count(&self) -> u32 {
        self.metadata.total_turns
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// Time spent in the current phase so far.
    pub fn current_phase_duration(&self) -> Duration {
        self.metadata
            .open_entry()
            .map(|entry| Utc::now() - entry.entered_at)
            .unwrap_or_else(Duration::zero)
    }

    /// One-line summary for logs and operator views.
    pub fn status_line(&self) -> String {
        format!(
            "Phase: {} | Progress: {:.0}% | Missing: {} slots | Duration: {}s | Turns: {}",
            self.state.current_phase,
            self.progress_fraction() * 100.0,
            self.state.missing_slots().len(),
            self.current_phase_duration().num_seconds(),
            self.metadata.total_turns
        )
    }

    fn collected_required_count(&self) -> usize {
        self.state
            .required_slots
            .iter()
            .filter(|slot| self.state.has_collected(slot))
            .count()
    }
}

impl Default for SessionProgressionController {
    fn default() -> Self {
        Self::new()
    }
}
