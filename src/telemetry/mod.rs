//! Per-turn quality telemetry.
//!
//! Four independent inspectors score each [`TelemetryEvent`]:
//! - cleanliness: structural defects in the message text
//! - tone fidelity: similarity to a reference voice (async, deadline-bound)
//! - retrieval relevance: quality of any retrieved context
//! - progress: extracted slots against required slots
//!
//! [`QualityTelemetryAggregator`] combines them with threshold checks into a
//! [`TelemetryResult`] and keeps a per-session history for summaries and
//! trend detection.

pub mod aggregator;
pub mod cleanliness;
pub mod event;
pub mod flags;
pub mod progress;
pub mod result;
pub mod retrieval;
pub mod summary;
pub mod thresholds;
pub mod tone;

pub use aggregator::QualityTelemetryAggregator;
pub use cleanliness::{CleanlinessDetails, score_cleanliness};
pub use event::{RetrievedChunk, TelemetryEvent};
pub use flags::TelemetryFlag;
pub use progress::{
    ProgressDetails, ProgressInspector, ProgressReport, ProgressVelocity, detect_stalling,
    turn_efficiency,
};
pub use result::{TelemetryDetails, TelemetryResult};
pub use retrieval::{RetrievalDetails, ScoreDistribution, analyze_distribution, score_retrieval};
pub use summary::{QualityLabel, TelemetryHistory, TelemetrySummary, Trend, TrendReport};
pub use thresholds::{TelemetryThresholds, ThresholdOverrides};
pub use tone::{
    ComparisonMethod, LexicalEmbedder, ToneDetails, ToneInspector, ToneReport, VoiceEmbedder,
    cosine_similarity,
};
