//! Retrieval-relevance scoring.
//!
//! No retrieved context scores 100: not using retrieval is not a defect.
//! Otherwise the mean relevance is scaled to a percentage and adjusted:
//!
//! - minimum below 0.3: -15
//! - fewer than 2 items: -10
//! - more than 10 items: -5
//! - score range under 0.2 with mean above 0.6: +10

use serde::{Deserialize, Serialize};

use crate::telemetry::event::{RetrievedChunk, TelemetryEvent};
use crate::telemetry::flags::TelemetryFlag;

/// Items scoring below this count as irrelevant.
pub const IRRELEVANT_BELOW: f64 = 0.4;

const LOW_MIN_SCORE: f64 = 0.3;
const LOW_MIN_PENALTY: i32 = 15;
const FEW_CHUNKS_PENALTY: i32 = 10;
const MANY_CHUNKS_LIMIT: usize = 10;
const MANY_CHUNKS_PENALTY: i32 = 5;
const TIGHT_RANGE: f64 = 0.2;
const TIGHT_RANGE_MIN_MEAN: f64 = 0.6;
const TIGHT_RANGE_BONUS: i32 = 10;

/// Histogram bucket labels, lowest first. Each bucket is half-open except
/// the last, which also holds scores of exactly 1.0 and above.
pub const HISTOGRAM_BUCKETS: [&str; 5] = ["0.0-0.2", "0.2-0.4", "0.4-0.6", "0.6-0.8", "0.8-1.0"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDetails {
    pub chunk_count: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub irrelevant_chunks: usize,
}

impl RetrievalDetails {
    pub fn inspect(event: &TelemetryEvent) -> Self {
        let scores = scores(&event.retrieved_chunks);
        if scores.is_empty() {
            return Self {
                chunk_count: 0,
                average_score: 0.0,
                min_score: 0.0,
                max_score: 0.0,
                irrelevant_chunks: 0,
            };
        }
        Self {
            chunk_count: scores.len(),
            average_score: mean(&scores),
            min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            irrelevant_chunks: scores.iter().filter(|&&s| s < IRRELEVANT_BELOW).count(),
        }
    }

    /// Score in `[0, 100]`.
    pub fn score(&self) -> u8 {
        if self.chunk_count == 0 {
            return 100;
        }
        let mut score = (self.average_score * 100.0).floor() as i32;
        if self.min_score < LOW_MIN_SCORE {
            score -= LOW_MIN_PENALTY;
        }
        if self.chunk_count < 2 {
            score -= FEW_CHUNKS_PENALTY;
        }
        if self.chunk_count > MANY_CHUNKS_LIMIT {
            score -= MANY_CHUNKS_PENALTY;
        }
        if self.max_score - self.min_score < TIGHT_RANGE && self.average_score > TIGHT_RANGE_MIN_MEAN
        {
            score += TIGHT_RANGE_BONUS;
        }
        score.clamp(0, 100) as u8
    }

    pub fn flags(&self) -> Vec<TelemetryFlag> {
        if self.irrelevant_chunks > 0 {
            vec![TelemetryFlag::IrrelevantRetrieval]
        } else {
            Vec::new()
        }
    }
}

/// Retrieval-relevance score for `event` in `[0, 100]`.
pub fn score_retrieval(event: &TelemetryEvent) -> u8 {
    RetrievalDetails::inspect(event).score()
}

/// Spread of relevance scores, for tuning retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Item counts per bucket, in [`HISTOGRAM_BUCKETS`] order. All zero
    /// when nothing was retrieved.
    pub histogram: [usize; 5],
}

impl ScoreDistribution {
    /// Label and count for each bucket.
    pub fn buckets(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        HISTOGRAM_BUCKETS.iter().copied().zip(self.histogram.iter().copied())
    }
}

pub fn analyze_distribution(event: &TelemetryEvent) -> ScoreDistribution {
    let mut scores = scores(&event.retrieved_chunks);
    if scores.is_empty() {
        return ScoreDistribution {
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            histogram: [0; 5],
        };
    }

    let mean = mean(&scores);
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;

    scores.sort_by(|a, b| a.total_cmp(b));
    let mid = scores.len() / 2;
    let median = if scores.len() % 2 == 0 {
        (scores[mid - 1] + scores[mid]) / 2.0
    } else {
        scores[mid]
    };

    let mut histogram = [0usize; 5];
    for score in &scores {
        let bucket = match *score {
            s if s < 0.2 => 0,
            s if s < 0.4 => 1,
            s if s < 0.6 => 2,
            s if s < 0.8 => 3,
            _ => 4,
        };
        histogram[bucket] += 1;
    }

    ScoreDistribution {
        mean,
        median,
        std_dev: variance.sqrt(),
        histogram,
    }
}

fn scores(chunks: &[RetrievedChunk]) -> Vec<f64> {
    chunks.iter().map(|c| c.score).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
