//! Cadence: slot-gated session progression and per-turn quality telemetry
//! for multi-turn conversational assessments.

pub mod config;
pub mod errors;
pub mod logging;
pub mod session;
pub mod telemetry;

pub use cadence_common::{Phase, PhaseParseError, SlotCatalog, Turn};
pub use config::CadenceConfig;
pub use errors::{ConfigError, ToneError};
pub use session::{SessionProgressionController, SessionSnapshot, TransitionResult};
pub use telemetry::{QualityTelemetryAggregator, TelemetryEvent, TelemetryFlag, TelemetryResult};
