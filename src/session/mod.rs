//! Session progression: the slot-gated phase state machine.
//!
//! ## Components
//!
//! - [`controller`]: [`SessionProgressionController`], the state machine
//! - [`state`]: plain data shapes (state, metadata, snapshots)
//! - [`outcome`]: structured results for slot collection, transitions and
//!   validation
//!
//! The orchestrator drives one controller per session: after extracting
//! slot values from the student's message it marks them collected, then
//! calls `try_advance` once before composing the next reply, using
//! `missing_slots` to steer follow-up questions.

pub mod controller;
pub mod outcome;
pub mod state;

pub use controller::SessionProgressionController;
pub use outcome::{SlotCollection, TransitionReason, TransitionResult, ValidationIssue};
pub use state::{PhaseHistoryEntry, SessionMetadata, SessionSnapshot, SessionState};
