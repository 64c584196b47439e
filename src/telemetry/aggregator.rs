//! Per-session quality aggregation.
//!
//! ## Example
//!
//! ```
//! use cadence::telemetry::{QualityTelemetryAggregator, TelemetryEvent, TelemetryFlag};
//! use cadence_common::Phase;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut aggregator = QualityTelemetryAggregator::new("session-7");
//! let event = TelemetryEvent::new("session-7", Phase::Rapport)
//!     .with_assistant_message("I hear you. What's been on your mind?")
//!     .with_required_slots(["student_background", "emotional_state", "motivation_reason"])
//!     .with_turn_number(5);
//!
//! let result = aggregator.evaluate(&event).await;
//! assert!(result.has_flag(TelemetryFlag::StalledConversation));
//! assert_eq!(aggregator.history().len(), 1);
//! # }
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::telemetry::cleanliness::CleanlinessDetails;
use crate::telemetry::event::TelemetryEvent;
use crate::telemetry::flags::{TelemetryFlag, push_unique};
use crate::telemetry::progress::ProgressInspector;
use crate::telemetry::result::{TelemetryDetails, TelemetryResult};
use crate::telemetry::retrieval::RetrievalDetails;
use crate::telemetry::summary::{TelemetryHistory, TelemetrySummary, TrendReport};
use crate::telemetry::thresholds::{TelemetryThresholds, ThresholdOverrides};
use crate::telemetry::tone::ToneInspector;

/// Runs the four inspectors against each turn and keeps the session's
/// result history.
///
/// One instance per session. History is append-only until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct QualityTelemetryAggregator {
    session_id: String,
    thresholds: TelemetryThresholds,
    tone: ToneInspector,
    progress: ProgressInspector,
    history: Vec<TelemetryResult>,
}

impl QualityTelemetryAggregator {
    /// Aggregator with default thresholds and inspectors.
    pub fn new(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let thresholds = TelemetryThresholds::default();
        debug!(session_id = %session_id, ?thresholds, "Telemetry aggregator created");
        Self {
            session_id,
            thresholds,
            tone: ToneInspector::new(),
            progress: ProgressInspector::new(),
            history: Vec::new(),
        }
    }

    /// Apply a partial threshold override; unset keys keep their defaults.
    pub fn with_thresholds(mut self, overrides: ThresholdOverrides) -> Self {
        overrides.apply(&mut self.thresholds);
        self
    }

    pub fn with_tone_inspector(mut self, tone: ToneInspector) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_progress_inspector(mut self, progress: ProgressInspector) -> Self {
        self.progress = progress;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn thresholds(&self) -> TelemetryThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, overrides: ThresholdOverrides) {
        overrides.apply(&mut self.thresholds);
        info!(
            session_id = %self.session_id,
            thresholds = ?self.thresholds,
            "Telemetry thresholds updated"
        );
    }

    /// Score one turn, record the result in history and return it.
    ///
    /// Always produces a complete result: a failed tone comparison scores 0
    /// rather than erroring.
    pub async fn evaluate(&mut self, event: &TelemetryEvent) -> TelemetryResult {
        if event.session_id != self.session_id {
            warn!(
                session_id = %self.session_id,
                event_session_id = %event.session_id,
                "Telemetry event belongs to a different session"
            );
        }

        let cleanliness = CleanlinessDetails::inspect(event);
        let tone = self.tone.inspect(event).await;
        let retrieval = RetrievalDetails::inspect(event);
        let progress = self.progress.inspect(event);

        let scores = [
            cleanliness.score(),
            tone.score,
            retrieval.score(),
            progress.score,
        ];
        let retrieval_used = !event.retrieved_chunks.is_empty();

        let mut flags = Vec::new();
        for ((_, threshold, flag), score) in self.thresholds.entries().into_iter().zip(scores) {
            if flag == TelemetryFlag::LowRetrievalRelevance && !retrieval_used {
                continue;
            }
            if f64::from(score) < threshold {
                push_unique(&mut flags, flag);
            }
        }
        for flag in cleanliness
            .flags()
            .into_iter()
            .chain(tone.flags())
            .chain(retrieval.flags())
            .chain(progress.flags())
        {
            push_unique(&mut flags, flag);
        }

        let result = TelemetryResult {
            cleanliness: scores[0],
            tone_fidelity: scores[1],
            retrieval_relevance: scores[2],
            progress: scores[3],
            flags,
            details: TelemetryDetails {
                cleanliness,
                tone_fidelity: tone.details,
                retrieval_relevance: retrieval,
                progress: progress.details,
            },
            evaluated_at: Utc::now(),
        };

        if result.passed() {
            debug!(
                session_id = %self.session_id,
                phase = %event.phase,
                "All quality checks passed"
            );
        } else {
            let flags: Vec<&str> = result.flags.iter().map(|f| f.as_str()).collect();
            info!(
                session_id = %self.session_id,
                phase = %event.phase,
                cleanliness = result.cleanliness,
                tone_fidelity = result.tone_fidelity,
                retrieval_relevance = result.retrieval_relevance,
                progress = result.progress,
                flags = ?flags,
                "Quality issues detected"
            );
        }

        self.history.push(result.clone());
        result
    }

    pub fn history(&self) -> &[TelemetryResult] {
        &self.history
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary::from_history(&self.history)
    }

    pub fn detect_trends(&self) -> TrendReport {
        TrendReport::from_history(&self.history)
    }

    pub fn export_history(&self) -> TelemetryHistory {
        TelemetryHistory {
            session_id: self.session_id.clone(),
            results: self.history.clone(),
            summary: self.summary(),
            trends: self.detect_trends(),
        }
    }

    /// Clear the history. Thresholds and inspectors are kept.
    pub fn reset(&mut self) {
        self.history.clear();
        info!(session_id = %self.session_id, "Telemetry history reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::event::RetrievedChunk;
    use crate::telemetry::summary::{QualityLabel, Trend};
    use crate::telemetry::tone::{ComparisonMethod, VoiceEmbedder};
    use cadence_common::Phase;
    use std::sync::Arc;

    const WARM: &str = "I hear you. That makes sense, and we can slow this down together. \
                        What feels heaviest for you right now?";

    fn good_event(session: &str) -> TelemetryEvent {
        TelemetryEvent::new(session, Phase::Rapport)
            .with_student_message("I'm worried about my grades.")
            .with_assistant_message(WARM)
            .with_extracted_slots(["student_background", "emotional_state", "motivation_reason"])
            .with_required_slots(["student_background", "emotional_state", "motivation_reason"])
            .with_chunks([
                RetrievedChunk::new("a", 0.9),
                RetrievedChunk::new("b", 0.85),
                RetrievedChunk::new("c", 0.88),
            ])
            .with_turn_number(2)
    }

    fn poor_event(session: &str) -> TelemetryEvent {
        TelemetryEvent::new(session, Phase::Rapport)
            .with_assistant_message("")
            .with_required_slots(["student_background", "emotional_state"])
            .with_turn_number(6)
    }

    // =========================================
    // evaluate
    // =========================================

    #[tokio::test]
    async fn test_good_turn_passes() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        let result = aggregator.evaluate(&good_event("s1")).await;
        assert_eq!(result.cleanliness, 100);
        assert_eq!(result.retrieval_relevance, 97);
        assert_eq!(result.progress, 100);
        assert!(result.tone_fidelity >= 75);
        assert!(result.passed(), "unexpected flags: {:?}", result.flags);
    }

    #[tokio::test]
    async fn test_poor_turn_flags() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        let result = aggregator.evaluate(&poor_event("s1")).await;

        assert_eq!(result.tone_fidelity, 0);
        assert!(result.has_flag(TelemetryFlag::LowToneFidelity));
        assert!(result.has_flag(TelemetryFlag::VoiceDrift));
        assert!(result.has_flag(TelemetryFlag::SlowProgress));
        assert!(result.has_flag(TelemetryFlag::EmptyMessage));
        assert!(result.has_flag(TelemetryFlag::StalledConversation));
        // cleanliness is 80, above the default threshold
        assert!(!result.has_flag(TelemetryFlag::LowCleanliness));
        // no retrieval happened, so its threshold does not apply
        assert_eq!(result.retrieval_relevance, 100);
        assert!(!result.has_flag(TelemetryFlag::LowRetrievalRelevance));
    }

    #[tokio::test]
    async fn test_flags_deduplicated_and_ordered() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        let result = aggregator.evaluate(&poor_event("s1")).await;
        let mut seen = std::collections::HashSet::new();
        assert!(result.flags.iter().all(|f| seen.insert(*f)));
        // threshold flags come before inspector flags
        let first_specific = result.flags.iter().position(|f| !f.is_threshold_flag());
        let last_threshold = result.flags.iter().rposition(|f| f.is_threshold_flag());
        assert!(last_threshold < first_specific);
    }

    #[tokio::test]
    async fn test_low_retrieval_flag_only_with_chunks() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        let event = good_event("s1").with_chunks([RetrievedChunk::new("d", 0.05)]);
        let result = aggregator.evaluate(&event).await;
        assert!(result.has_flag(TelemetryFlag::LowRetrievalRelevance));
        assert!(result.has_flag(TelemetryFlag::IrrelevantRetrieval));
    }

    #[tokio::test]
    async fn test_stalled_conversation_turn_boundary() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        let base = TelemetryEvent::new("s1", Phase::CurrentState)
            .with_assistant_message(WARM)
            .with_required_slots(["academics_rigor", "ec_depth"]);

        let at_five = aggregator.evaluate(&base.clone().with_turn_number(5)).await;
        let at_three = aggregator.evaluate(&base.with_turn_number(3)).await;
        assert!(at_five.has_flag(TelemetryFlag::StalledConversation));
        assert!(!at_three.has_flag(TelemetryFlag::StalledConversation));
    }

    struct NanEmbedder;

    #[async_trait::async_trait]
    impl VoiceEmbedder for NanEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f64>, crate::errors::ToneError> {
            Ok(vec![f64::NAN; 8])
        }
    }

    struct PanickingEmbedder;

    #[async_trait::async_trait]
    impl VoiceEmbedder for PanickingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f64>, crate::errors::ToneError> {
            panic!("embedding backend crashed");
        }
    }

    #[tokio::test]
    async fn test_embedder_failures_still_produce_results() {
        for embedder in [
            Arc::new(NanEmbedder) as Arc<dyn VoiceEmbedder>,
            Arc::new(PanickingEmbedder),
        ] {
            let mut aggregator = QualityTelemetryAggregator::new("s1")
                .with_tone_inspector(ToneInspector::new().with_embedder(embedder));
            let result = aggregator.evaluate(&good_event("s1")).await;

            assert_eq!(result.tone_fidelity, 0);
            assert_eq!(
                result.details.tone_fidelity.comparison_method,
                ComparisonMethod::Unavailable
            );
            assert!(result.has_flag(TelemetryFlag::LowToneFidelity));
            assert_eq!(result.progress, 100);

            let json = aggregator.export_history().to_json().unwrap();
            let restored: TelemetryHistory = serde_json::from_str(&json).unwrap();
            assert_eq!(restored.results.len(), 1);
            assert_eq!(restored.results[0].details.tone_fidelity.cosine_similarity, 0.0);
        }
    }

    #[tokio::test]
    async fn test_mismatched_session_still_evaluated() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        aggregator.evaluate(&good_event("other")).await;
        assert_eq!(aggregator.history().len(), 1);
    }

    // =========================================
    // thresholds
    // =========================================

    #[tokio::test]
    async fn test_threshold_overrides() {
        let mut aggregator = QualityTelemetryAggregator::new("s1")
            .with_thresholds(ThresholdOverrides::default().with_cleanliness(90.0));
        assert_eq!(aggregator.thresholds().cleanliness, 90.0);
        assert_eq!(aggregator.thresholds().progress, 50.0);

        let result = aggregator.evaluate(&poor_event("s1")).await;
        assert!(result.has_flag(TelemetryFlag::LowCleanliness));

        aggregator.set_thresholds(
            ThresholdOverrides::default()
                .with_cleanliness(10.0)
                .with_tone_fidelity(0.0)
                .with_progress(0.0),
        );
        let result = aggregator.evaluate(&poor_event("s1")).await;
        assert!(!result.has_flag(TelemetryFlag::LowCleanliness));
        assert!(!result.has_flag(TelemetryFlag::LowToneFidelity));
        assert!(!result.has_flag(TelemetryFlag::SlowProgress));
        // inspector flags do not depend on thresholds
        assert!(result.has_flag(TelemetryFlag::VoiceDrift));
    }

    // =========================================
    // history, summary, trends
    // =========================================

    #[tokio::test]
    async fn test_summary_over_history() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        aggregator.evaluate(&good_event("s1")).await;
        aggregator.evaluate(&good_event("s1")).await;

        let summary = aggregator.summary();
        assert_eq!(summary.total_turns, 2);
        assert_eq!(summary.average_cleanliness, 100.0);
        assert_eq!(summary.total_flags, 0);
        assert_eq!(summary.overall_quality, QualityLabel::Excellent);

        aggregator.evaluate(&poor_event("s1")).await;
        let summary = aggregator.summary();
        assert_eq!(summary.total_turns, 3);
        assert_eq!(summary.flag_breakdown.get(&TelemetryFlag::StalledConversation), Some(&1));
        assert_eq!(
            summary.total_flags,
            aggregator.history().iter().map(|r| r.flags.len()).sum::<usize>()
        );
    }

    #[tokio::test]
    async fn test_trends_detect_degradation() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        aggregator.evaluate(&good_event("s1")).await;
        aggregator.evaluate(&good_event("s1")).await;
        assert_eq!(aggregator.detect_trends(), TrendReport::default());

        aggregator.evaluate(&poor_event("s1")).await;
        aggregator.evaluate(&poor_event("s1")).await;
        let trends = aggregator.detect_trends();
        assert_eq!(trends.tone_fidelity, Trend::Degrading);
        assert_eq!(trends.progress, Trend::Degrading);
        assert_eq!(trends.retrieval_relevance, Trend::Stable);
        assert!(trends.any_degrading());
    }

    #[tokio::test]
    async fn test_export_and_reset() {
        let mut aggregator = QualityTelemetryAggregator::new("s1");
        aggregator.evaluate(&good_event("s1")).await;

        let export = aggregator.export_history();
        assert_eq!(export.session_id, "s1");
        assert_eq!(export.results.len(), 1);
        assert_eq!(export.summary.total_turns, 1);
        let json = export.to_json().unwrap();
        assert!(json.contains("\"session_id\": \"s1\""));

        aggregator.reset();
        assert!(aggregator.history().is_empty());
        assert_eq!(aggregator.summary().overall_quality, QualityLabel::Poor);
        assert_eq!(aggregator.session_id(), "s1");
    }
}
