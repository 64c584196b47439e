//! Configuration for controllers and telemetry aggregators.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then environment variables.
//!
//! ```toml
//! [thresholds]
//! cleanliness = 70
//! tone_fidelity = 80
//!
//! [tone]
//! timeout_ms = 1500
//! reference_voice = [0.25, 0.1, 0.0, 0.15, 0.3, 0.0, 0.3, 0.0]
//!
//! [progress]
//! default_phase_size = 5
//! stall_turn = 5
//!
//! [slots]
//! rapport = ["student_background", "emotional_state"]
//! ```
//!
//! Environment overrides:
//! - `CADENCE_TONE_TIMEOUT_MS`
//! - `CADENCE_THRESHOLD_CLEANLINESS`, `CADENCE_THRESHOLD_TONE_FIDELITY`,
//!   `CADENCE_THRESHOLD_RETRIEVAL_RELEVANCE`, `CADENCE_THRESHOLD_PROGRESS`

use anyhow::{Context, Result};
use cadence_common::{Phase, SlotCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::ConfigError;
use crate::session::SessionProgressionController;
use crate::telemetry::progress::{DEFAULT_PHASE_SIZE, DEFAULT_STALL_TURN};
use crate::telemetry::tone::{DEFAULT_TONE_TIMEOUT, LEXICAL_DIMENSIONS};
use crate::telemetry::{
    ProgressInspector, QualityTelemetryAggregator, TelemetryThresholds, ThresholdOverrides,
    ToneInspector,
};

pub const ENV_TONE_TIMEOUT_MS: &str = "CADENCE_TONE_TIMEOUT_MS";
pub const ENV_THRESHOLD_PREFIX: &str = "CADENCE_THRESHOLD_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneSection {
    /// Deadline for one embedding call, in milliseconds.
    #[serde(default = "default_tone_timeout_ms")]
    pub timeout_ms: u64,
    /// Reference voice vector. Uses the built-in lexical voice when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_voice: Option<Vec<f64>>,
}

fn default_tone_timeout_ms() -> u64 {
    DEFAULT_TONE_TIMEOUT.as_millis() as u64
}

impl Default for ToneSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_tone_timeout_ms(),
            reference_voice: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSection {
    /// Assumed required-slot count for events that list none.
    #[serde(default = "default_phase_size")]
    pub default_phase_size: usize,
    /// Turn number from which zero collected slots counts as stalled.
    #[serde(default = "default_stall_turn")]
    pub stall_turn: u32,
}

fn default_phase_size() -> usize {
    DEFAULT_PHASE_SIZE
}

fn default_stall_turn() -> u32 {
    DEFAULT_STALL_TURN
}

impl Default for ProgressSection {
    fn default() -> Self {
        Self {
            default_phase_size: default_phase_size(),
            stall_turn: default_stall_turn(),
        }
    }
}

/// The complete cadence.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Partial threshold override; unset keys keep their defaults.
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    #[serde(default)]
    pub tone: ToneSection,
    #[serde(default)]
    pub progress: ProgressSection,
    /// Per-phase required-slot overrides, keyed by phase name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, Vec<String>>,
}

impl CadenceConfig {
    /// Load from a TOML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            .with_env()
            .context("Failed to apply environment overrides")?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        debug!(path = %path.display(), "Loaded cadence config");
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults (plus
    /// environment overrides) when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default()
            .with_env()
            .context("Failed to apply environment overrides")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string. No environment overrides, no validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize cadence config")
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TONE_TIMEOUT_MS) {
            self.tone.timeout_ms = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TONE_TIMEOUT_MS.to_string(),
                value: value.clone(),
            })?;
        }

        let mut env_thresholds = ThresholdOverrides::default();
        for (name, slot) in [
            ("CLEANLINESS", &mut env_thresholds.cleanliness),
            ("TONE_FIDELITY", &mut env_thresholds.tone_fidelity),
            ("RETRIEVAL_RELEVANCE", &mut env_thresholds.retrieval_relevance),
            ("PROGRESS", &mut env_thresholds.progress),
        ] {
            let var = format!("{}{}", ENV_THRESHOLD_PREFIX, name);
            if let Some(value) = lookup(&var) {
                let parsed = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        var: var.clone(),
                        value: value.clone(),
                    })?;
                *slot = Some(parsed);
            }
        }
        if !env_thresholds.is_empty() {
            debug!(overrides = ?env_thresholds, "Applying threshold overrides from environment");
        }
        self.thresholds = self.thresholds.merge(env_thresholds);
        Ok(self)
    }

    /// Check ranges, the reference voice and phase names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.thresholds.entries() {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange {
                    name: name.to_string(),
                    value,
                });
            }
        }
        if self.tone.timeout_ms == 0 {
            return Err(ConfigError::MustBePositive {
                field: "tone.timeout_ms",
            });
        }
        if self.progress.default_phase_size == 0 {
            return Err(ConfigError::MustBePositive {
                field: "progress.default_phase_size",
            });
        }
        if let Some(reference) = &self.tone.reference_voice {
            if reference.len() != LEXICAL_DIMENSIONS {
                return Err(ConfigError::ReferenceVoiceDimension {
                    expected: LEXICAL_DIMENSIONS,
                    actual: reference.len(),
                });
            }
            if let Some(index) = reference.iter().position(|v| !v.is_finite()) {
                return Err(ConfigError::ReferenceVoiceNotFinite {
                    index,
                    value: reference[index],
                });
            }
        }
        self.slot_overrides()?;
        Ok(())
    }

    /// `[slots]` entries keyed by parsed phase. Two keys naming the same
    /// phase (`current-state` and `current_state`) are rejected.
    fn slot_overrides(&self) -> Result<BTreeMap<Phase, (&str, &[String])>, ConfigError> {
        let mut overrides: BTreeMap<Phase, (&str, &[String])> = BTreeMap::new();
        for (name, slots) in &self.slots {
            let phase: Phase = name
                .parse()
                .map_err(|_| ConfigError::UnknownPhase(name.clone()))?;
            if let Some((first, _)) = overrides.insert(phase, (name.as_str(), slots.as_slice())) {
                return Err(ConfigError::DuplicatePhase {
                    phase: phase.to_string(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        Ok(overrides)
    }

    /// Effective thresholds: defaults with the configured overrides.
    pub fn thresholds(&self) -> TelemetryThresholds {
        TelemetryThresholds::with_overrides(&self.thresholds)
    }

    /// The canonical catalog with the `[slots]` overrides applied.
    pub fn slot_catalog(&self) -> Result<SlotCatalog, ConfigError> {
        let mut catalog = SlotCatalog::canonical();
        for (phase, (_, slots)) in self.slot_overrides()? {
            catalog = catalog.with_phase(phase, slots.iter().cloned());
        }
        Ok(catalog)
    }

    pub fn tone_inspector(&self) -> ToneInspector {
        let inspector =
            ToneInspector::new().with_timeout(Duration::from_millis(self.tone.timeout_ms));
        match &self.tone.reference_voice {
            Some(reference) => inspector.with_reference_voice(reference.clone()),
            None => inspector,
        }
    }

    pub fn progress_inspector(&self) -> ProgressInspector {
        ProgressInspector::new()
            .with_default_phase_size(self.progress.default_phase_size)
            .with_stall_turn(self.progress.stall_turn)
    }

    /// A fresh aggregator for `session_id` using these settings.
    pub fn aggregator(&self, session_id: impl Into<String>) -> QualityTelemetryAggregator {
        QualityTelemetryAggregator::new(session_id)
            .with_thresholds(self.thresholds)
            .with_tone_inspector(self.tone_inspector())
            .with_progress_inspector(self.progress_inspector())
    }

    /// A fresh controller over the configured slot catalog.
    pub fn controller(&self) -> Result<SessionProgressionController, ConfigError> {
        Ok(SessionProgressionController::with_catalog(Arc::new(
            self.slot_catalog()?,
        )))
    }
}
