//! Per-metric thresholds that turn scores into flags.

use serde::{Deserialize, Serialize};

use crate::telemetry::flags::TelemetryFlag;

/// Score floor for each metric. A score strictly below its floor raises the
/// corresponding threshold flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryThresholds {
    pub cleanliness: f64,
    pub tone_fidelity: f64,
    pub retrieval_relevance: f64,
    pub progress: f64,
}

impl Default for TelemetryThresholds {
    fn default() -> Self {
        Self {
            cleanliness: 70.0,
            tone_fidelity: 75.0,
            retrieval_relevance: 60.0,
            progress: 50.0,
        }
    }
}

impl TelemetryThresholds {
    /// Defaults with `overrides` applied on top.
    pub fn with_overrides(overrides: &ThresholdOverrides) -> Self {
        let mut thresholds = Self::default();
        overrides.apply(&mut thresholds);
        thresholds
    }

    /// Metric name, value and flag for each threshold, in a fixed order.
    pub fn entries(&self) -> [(&'static str, f64, TelemetryFlag); 4] {
        [
            ("cleanliness", self.cleanliness, TelemetryFlag::LowCleanliness),
            ("tone_fidelity", self.tone_fidelity, TelemetryFlag::LowToneFidelity),
            (
                "retrieval_relevance",
                self.retrieval_relevance,
                TelemetryFlag::LowRetrievalRelevance,
            ),
            ("progress", self.progress, TelemetryFlag::SlowProgress),
        ]
    }
}

/// Partial threshold override. Unset keys keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanliness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_fidelity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl ThresholdOverrides {
    pub fn with_cleanliness(mut self, value: f64) -> Self {
        self.cleanliness = Some(value);
        self
    }

    pub fn with_tone_fidelity(mut self, value: f64) -> Self {
        self.tone_fidelity = Some(value);
        self
    }

    pub fn with_retrieval_relevance(mut self, value: f64) -> Self {
        self.retrieval_relevance = Some(value);
        self
    }

    pub fn with_progress(mut self, value: f64) -> Self {
        self.progress = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cleanliness.is_none()
            && self.tone_fidelity.is_none()
            && self.retrieval_relevance.is_none()
            && self.progress.is_none()
    }

    /// Set every override present here on `thresholds`.
    pub fn apply(&self, thresholds: &mut TelemetryThresholds) {
        if let Some(v) = self.cleanliness {
            thresholds.cleanliness = v;
        }
        if let Some(v) = self.tone_fidelity {
            thresholds.tone_fidelity = v;
        }
        if let Some(v) = self.retrieval_relevance {
            thresholds.retrieval_relevance = v;
        }
        if let Some(v) = self.progress {
            thresholds.progress = v;
        }
    }

    /// Merge `other` over `self`; values in `other` win.
    pub fn merge(self, other: ThresholdOverrides) -> Self {
        Self {
            cleanliness: other.cleanliness.or(self.cleanliness),
            tone_fidelity: other.tone_fidelity.or(self.tone_fidelity),
            retrieval_relevance: other.retrieval_relevance.or(self.retrieval_relevance),
            progress: other.progress.or(self.progress),
        }
    }

    /// Name and value of every override present.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        [
            ("cleanliness", self.cleanliness),
            ("tone_fidelity", self.tone_fidelity),
            ("retrieval_relevance", self.retrieval_relevance),
            ("progress", self.progress),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}
