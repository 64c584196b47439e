//! Required-slot vocabulary per phase.
//!
//! A slot is an opaque identifier for one fact the conversation must elicit
//! before its phase can close. Which slots a phase requires is held in a
//! [`SlotCatalog`], an immutable map that is built once and handed to every
//! controller that needs it.
//!
//! ## Example
//!
//! ```
//! use cadence_common::{Phase, SlotCatalog};
//!
//! let catalog = SlotCatalog::canonical();
//! assert_eq!(
//!     catalog.required_slots(Phase::Rapport),
//!     ["student_background", "emotional_state", "motivation_reason"]
//! );
//! assert!(catalog.required_slots(Phase::Complete).is_empty());
//!
//! // Overrides produce a new catalog; the canonical one is untouched.
//! let custom = SlotCatalog::canonical().with_phase(Phase::Rapport, ["intro"]);
//! assert_eq!(custom.required_slots(Phase::Rapport), ["intro"]);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::phase::Phase;

/// Immutable phase → ordered required-slot map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCatalog {
    slots: BTreeMap<Phase, Vec<String>>,
}

impl SlotCatalog {
    /// The default assessment vocabulary.
    pub fn canonical() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(
            Phase::Rapport,
            to_owned(&["student_background", "emotional_state", "motivation_reason"]),
        );
        slots.insert(
            Phase::CurrentState,
            to_owned(&[
                "academics_rigor",
                "ec_depth",
                "passion_signals",
                "service_signals",
                "identity_signals",
            ]),
        );
        slots.insert(
            Phase::Diagnostic,
            to_owned(&[
                "aptitude_score",
                "passion_score",
                "service_score",
                "narrative_risks",
                "narrative_opportunities",
            ]),
        );
        slots.insert(
            Phase::Preview,
            to_owned(&[
                "12m_direction_signal",
                "summer_direction_signal",
                "awards_direction_signal",
            ]),
        );
        slots.insert(Phase::Complete, Vec::new());
        Self { slots }
    }

    /// Replace the required slots for one phase.
    ///
    /// Duplicate names are dropped, keeping first occurrence order. The
    /// terminal phase never requires anything, so slots given for it are
    /// discarded.
    pub fn with_phase<I, S>(mut self, phase: Phase, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        if !phase.is_terminal() {
            for slot in slots {
                let slot = slot.into();
                if !ordered.contains(&slot) {
                    ordered.push(slot);
                }
            }
        }
        self.slots.insert(phase, ordered);
        self
    }

    /// Required slots for a phase, in declaration order.
    ///
    /// Phases missing from the catalog require nothing.
    pub fn required_slots(&self, phase: Phase) -> &[String] {
        self.slots.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check if the catalog declares a slot list for `phase`.
    pub fn contains(&self, phase: Phase) -> bool {
        self.slots.contains_key(&phase)
    }

    /// Check if `slot` belongs to any phase's vocabulary.
    ///
    /// # Examples
    ///
    /// ```
    /// use cadence_common::SlotCatalog;
    ///
    /// let catalog = SlotCatalog::canonical();
    /// assert!(catalog.is_known_slot("ec_depth"));
    /// assert!(!catalog.is_known_slot("favorite_color"));
    /// ```
    pub fn is_known_slot(&self, slot: &str) -> bool {
        self.slots.values().any(|s| s.iter().any(|known| known == slot))
    }

    /// The phase whose vocabulary declares `slot` first, if any.
    pub fn phase_of(&self, slot: &str) -> Option<Phase> {
        self.slots
            .iter()
            .find(|(_, slots)| slots.iter().any(|s| s == slot))
            .map(|(phase, _)| *phase)
    }

    /// Total number of required slots across all phases.
    pub fn total_slots(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self::canonical()
    }
}

fn to_owned(slots: &[&str]) -> Vec<String> {
    slots.iter().map(|s| s.to_string()).collect()
}
