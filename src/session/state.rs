//! Plain data shapes owned by the session controller.
//!
//! These are also the persistence contract: a caller that needs sessions
//! to survive a restart serializes a [`SessionSnapshot`] and hands it back
//! to [`SessionProgressionController::restore`](super::SessionProgressionController::restore).

use cadence_common::{Phase, SlotCatalog, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutable progression state: phase, slots and turn history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Current phase.
    pub current_phase: Phase,
    /// Required slots for `current_phase`, copied from the catalog.
    pub required_slots: Vec<String>,
    /// Slots collected during the current phase, deduplicated, in
    /// collection order. Cleared on every phase change.
    pub collected_slots: Vec<String>,
    /// Append-only turn history.
    pub turn_history: Vec<Turn>,
}

impl SessionState {
    /// Initial state: first phase, nothing collected, empty history.
    pub fn initial(catalog: &SlotCatalog) -> Self {
        let phase = Phase::default();
        Self {
            current_phase: phase,
            required_slots: catalog.required_slots(phase).to_vec(),
            collected_slots: Vec::new(),
            turn_history: Vec::new(),
        }
    }

    /// Check if `slot` has been collected in the current phase.
    pub fn has_collected(&self, slot: &str) -> bool {
        self.collected_slots.iter().any(|s| s == slot)
    }

    /// Required slots not yet collected, in declaration order.
    pub fn missing_slots(&self) -> Vec<String> {
        self.required_slots
            .iter()
            .filter(|slot| !self.has_collected(slot))
            .cloned()
            .collect()
    }
}

/// One entry in the append-only phase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: Phase,
    pub entered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
}

impl PhaseHistoryEntry {
    pub fn open(phase: Phase, entered_at: DateTime<Utc>) -> Self {
        Self {
            phase,
            entered_at,
            exited_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

/// Audit data derived from the controller's operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Identifier shared with the session's telemetry events.
    #[serde(default = "new_session_id")]
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_turns: u32,
    /// Exactly one open entry (the current phase) at all times.
    pub phase_history: Vec<PhaseHistoryEntry>,
}

impl SessionMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: new_session_id(),
            created_at: now,
            last_updated: now,
            total_turns: 0,
            phase_history: vec![PhaseHistoryEntry::open(Phase::default(), now)],
        }
    }

    /// The currently open history entry, if the history is consistent.
    pub fn open_entry(&self) -> Option<&PhaseHistoryEntry> {
        self.phase_history.last().filter(|e| e.is_open())
    }

    /// Close the open entry and open a new one for `phase`.
    pub(crate) fn record_transition(&mut self, phase: Phase, now: DateTime<Utc>) {
        if let Some(entry) = self.phase_history.last_mut() {
            if entry.exited_at.is_none() {
                entry.exited_at = Some(now);
            }
        }
        self.phase_history.push(PhaseHistoryEntry::open(phase, now));
        self.last_updated = now;
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serializable snapshot of a controller: state plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub metadata: SessionMetadata,
}

impl SessionSnapshot {
    /// Serialize to pretty JSON for a storage layer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot previously written with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_uses_catalog() {
        let state = SessionState::initial(&SlotCatalog::canonical());
        assert_eq!(state.current_phase, Phase::Rapport);
        assert_eq!(state.required_slots.len(), 3);
        assert!(state.collected_slots.is_empty());
        assert!(state.turn_history.is_empty());
    }

    #[test]
    fn test_missing_slots_preserves_order() {
        let mut state = SessionState::initial(&SlotCatalog::canonical());
        state.collected_slots.push("emotional_state".into());
        assert_eq!(
            state.missing_slots(),
            vec!["student_background".to_string(), "motivation_reason".to_string()]
        );
    }

    #[test]
    fn test_record_transition_closes_open_entry() {
        let now = Utc::now();
        let mut metadata = SessionMetadata::new(now);
        metadata.record_transition(Phase::CurrentState, now);

        assert_eq!(metadata.phase_history.len(), 2);
        assert!(metadata.phase_history[0].exited_at.is_some());
        assert_eq!(
            metadata.open_entry().map(|e| e.phase),
            Some(Phase::CurrentState)
        );
    }

    #[test]
    fn test_session_ids_are_unique() {
        let now = Utc::now();
        let a = SessionMetadata::new(now);
        let b = SessionMetadata::new(now);
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.session_id.len(), 36);
    }

    #[test]
    fn test_exited_at_omitted_when_open() {
        let entry = PhaseHistoryEntry::open(Phase::Rapport, Utc::now());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("exited_at"));
    }
}
