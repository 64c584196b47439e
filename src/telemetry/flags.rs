//! Qualitative flags attached to telemetry results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A specific quality concern detected for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFlag {
    /// Cleanliness below its threshold.
    LowCleanliness,
    /// Tone fidelity below its threshold.
    LowToneFidelity,
    /// Retrieval relevance below its threshold (only with context present).
    LowRetrievalRelevance,
    /// Progress below its threshold.
    SlowProgress,
    MalformedJson,
    /// Stray code fences in conversational text.
    FormattingFences,
    /// "As an AI..." style disclaimers.
    HallucinationMarkers,
    /// Replacement, zero-width or control characters.
    UnicodeIssues,
    EmptyMessage,
    OverlongMessage,
    /// The same slot extracted more than once in a turn.
    SlotDuplication,
    /// Tone far from the reference voice.
    VoiceDrift,
    /// At least one retrieved item scored as irrelevant.
    IrrelevantRetrieval,
    /// Several turns in with nothing collected.
    StalledConversation,
}

impl TelemetryFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowCleanliness => "low_cleanliness",
            Self::LowToneFidelity => "low_tone_fidelity",
            Self::LowRetrievalRelevance => "low_retrieval_relevance",
            Self::SlowProgress => "slow_progress",
            Self::MalformedJson => "malformed_json",
            Self::FormattingFences => "formatting_fences",
            Self::HallucinationMarkers => "hallucination_markers",
            Self::UnicodeIssues => "unicode_issues",
            Self::EmptyMessage => "empty_message",
            Self::OverlongMessage => "overlong_message",
            Self::SlotDuplication => "slot_duplication",
            Self::VoiceDrift => "voice_drift",
            Self::IrrelevantRetrieval => "irrelevant_retrieval",
            Self::StalledConversation => "stalled_conversation",
        }
    }

    /// Check if this flag comes from a threshold crossing rather than a
    /// specific inspector finding.
    pub fn is_threshold_flag(&self) -> bool {
        matches!(
            self,
            Self::LowCleanliness
                | Self::LowToneFidelity
                | Self::LowRetrievalRelevance
                | Self::SlowProgress
        )
    }
}

impl fmt::Display for TelemetryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append `flag` unless it is already present, preserving first-seen order.
pub(crate) fn push_unique(flags: &mut Vec<TelemetryFlag>, flag: TelemetryFlag) {
    if !flags.contains(&flag) {
        flags.push(flag);
    }
}
