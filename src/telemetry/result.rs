//! Aggregated per-turn telemetry results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::telemetry::cleanliness::CleanlinessDetails;
use crate::telemetry::flags::TelemetryFlag;
use crate::telemetry::progress::ProgressDetails;
use crate::telemetry::retrieval::RetrievalDetails;
use crate::telemetry::tone::ToneDetails;

/// Per-inspector breakdown behind the four scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDetails {
    pub cleanliness: CleanlinessDetails,
    pub tone_fidelity: ToneDetails,
    pub retrieval_relevance: RetrievalDetails,
    pub progress: ProgressDetails,
}

/// Scores, flags and details for one evaluated turn. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryResult {
    pub cleanliness: u8,
    pub tone_fidelity: u8,
    pub retrieval_relevance: u8,
    pub progress: u8,
    /// Deduplicated; threshold flags first, then inspector flags.
    pub flags: Vec<TelemetryFlag>,
    pub details: TelemetryDetails,
    pub evaluated_at: DateTime<Utc>,
}

impl TelemetryResult {
    pub fn has_flag(&self, flag: TelemetryFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// True when no flag was raised.
    pub fn passed(&self) -> bool {
        self.flags.is_empty()
    }

    /// Mean of the four scores.
    pub fn mean_score(&self) -> f64 {
        self.scores().iter().map(|&s| f64::from(s)).sum::<f64>() / 4.0
    }

    /// Scores in a fixed order: cleanliness, tone fidelity, retrieval
    /// relevance, progress.
    pub fn scores(&self) -> [u8; 4] {
        [
            self.cleanliness,
            self.tone_fidelity,
            self.retrieval_relevance,
            self.progress,
        ]
    }
}

impl fmt::Display for TelemetryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cleanliness={} tone={} retrieval={} progress={}",
            self.cleanliness, self.tone_fidelity, self.retrieval_relevance, self.progress
        )?;
        if !self.flags.is_empty() {
            let flags: Vec<&str> = self.flags.iter().map(|f| f.as_str()).collect();
            write!(f, " flags=[{}]", flags.join(", "))?;
        }
        Ok(())
    }
}
