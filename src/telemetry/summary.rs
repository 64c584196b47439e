//! Session-level statistics over a telemetry history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::telemetry::flags::TelemetryFlag;
use crate::telemetry::result::TelemetryResult;

/// Minimum history length before trends are computed.
pub const MIN_TREND_SAMPLES: usize = 3;

/// Half-to-half change, in points, needed to call a trend.
pub const TREND_DELTA: f64 = 5.0;

/// Categorical quality from the four-metric mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLabel {
    /// >= 85 excellent, >= 70 good, >= 50 fair, otherwise poor.
    pub fn from_mean(mean: f64) -> Self {
        if mean >= 85.0 {
            Self::Excellent
        } else if mean >= 70.0 {
            Self::Good
        } else if mean >= 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub total_turns: usize,
    pub average_cleanliness: f64,
    pub average_tone_fidelity: f64,
    pub average_retrieval_relevance: f64,
    pub average_progress: f64,
    /// Total flag occurrences across all results.
    pub total_flags: usize,
    pub flag_breakdown: BTreeMap<TelemetryFlag, usize>,
    pub overall_quality: QualityLabel,
}

impl TelemetrySummary {
    /// Summarize `history`. An empty history yields zeros and `Poor`.
    pub fn from_history(history: &[TelemetryResult]) -> Self {
        let mut flag_breakdown = BTreeMap::new();
        for flag in history.iter().flat_map(|r| r.flags.iter()) {
            *flag_breakdown.entry(*flag).or_insert(0) += 1;
        }
        let total_flags = flag_breakdown.values().sum();

        if history.is_empty() {
            return Self {
                total_turns: 0,
                average_cleanliness: 0.0,
                average_tone_fidelity: 0.0,
                average_retrieval_relevance: 0.0,
                average_progress: 0.0,
                total_flags,
                flag_breakdown,
                overall_quality: QualityLabel::Poor,
            };
        }

        let average = |metric: fn(&TelemetryResult) -> u8| {
            history.iter().map(|r| f64::from(metric(r))).sum::<f64>() / history.len() as f64
        };
        let average_cleanliness = average(|r| r.cleanliness);
        let average_tone_fidelity = average(|r| r.tone_fidelity);
        let average_retrieval_relevance = average(|r| r.retrieval_relevance);
        let average_progress = average(|r| r.progress);

        let overall = (average_cleanliness
            + average_tone_fidelity
            + average_retrieval_relevance
            + average_progress)
            / 4.0;

        Self {
            total_turns: history.len(),
            average_cleanliness,
            average_tone_fidelity,
            average_retrieval_relevance,
            average_progress,
            total_flags,
            flag_breakdown,
            overall_quality: QualityLabel::from_mean(overall),
        }
    }
}

impl fmt::Display for TelemetrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} turns, quality {} (cleanliness {:.1}, tone {:.1}, retrieval {:.1}, progress {:.1}), {} flags",
            self.total_turns,
            self.overall_quality,
            self.average_cleanliness,
            self.average_tone_fidelity,
            self.average_retrieval_relevance,
            self.average_progress,
            self.total_flags
        )
    }
}

/// Direction of a metric across a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Degrading,
}

impl Trend {
    /// Compare the mean of the second half of `scores` with the first half.
    /// The split is at `len / 2`, so an odd middle sample lands in the
    /// second half.
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.len() < MIN_TREND_SAMPLES {
            return Self::Stable;
        }
        let (first, second) = scores.split_at(scores.len() / 2);
        let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
        let diff = mean(second) - mean(first);
        if diff > TREND_DELTA {
            Self::Improving
        } else if diff < -TREND_DELTA {
            Self::Degrading
        } else {
            Self::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Stable => write!(f, "stable"),
            Self::Degrading => write!(f, "degrading"),
        }
    }
}

/// Per-metric trends over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendReport {
    pub cleanliness: Trend,
    pub tone_fidelity: Trend,
    pub retrieval_relevance: Trend,
    pub progress: Trend,
}

impl TrendReport {
    /// All metrics are stable until the history has three results.
    pub fn from_history(history: &[TelemetryResult]) -> Self {
        if history.len() < MIN_TREND_SAMPLES {
            return Self::default();
        }
        let trend = |metric: fn(&TelemetryResult) -> u8| {
            let scores: Vec<f64> = history.iter().map(|r| f64::from(metric(r))).collect();
            Trend::from_scores(&scores)
        };
        Self {
            cleanliness: trend(|r| r.cleanliness),
            tone_fidelity: trend(|r| r.tone_fidelity),
            retrieval_relevance: trend(|r| r.retrieval_relevance),
            progress: trend(|r| r.progress),
        }
    }

    pub fn any_degrading(&self) -> bool {
        [
            self.cleanliness,
            self.tone_fidelity,
            self.retrieval_relevance,
            self.progress,
        ]
        .contains(&Trend::Degrading)
    }
}

/// Everything an aggregator knows about its session, for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryHistory {
    pub session_id: String,
    pub results: Vec<TelemetryResult>,
    pub summary: TelemetrySummary,
    pub trends: TrendReport,
}

impl TelemetryHistory {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
