//! Shared vocabulary for Cadence: conversation phases, the per-phase slot
//! catalog and turn-history entries.
//!
//! These types are the plain data shapes exchanged between the session
//! controller, the telemetry aggregator and whatever storage layer the
//! caller chooses.

pub mod error;
pub mod phase;
pub mod slots;
pub mod turn;

pub use error::PhaseParseError;
pub use phase::Phase;
pub use slots::SlotCatalog;
pub use turn::Turn;
