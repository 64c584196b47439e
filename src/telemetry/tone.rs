//! Tone-fidelity scoring against a reference voice.
//!
//! The assistant text is embedded by a [`VoiceEmbedder`] and compared with
//! the reference voice vector by cosine similarity. The embedder is the only
//! seam in the crate that would reach an external service in a full
//! deployment, so every call runs under a deadline and any failure degrades
//! to a score of 0 with a warning instead of an error.
//!
//! The default [`LexicalEmbedder`] is deterministic and performs no I/O.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::ToneError;
use crate::telemetry::event::TelemetryEvent;
use crate::telemetry::flags::TelemetryFlag;

/// Default deadline for one embedding call.
pub const DEFAULT_TONE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Scores below this raise [`TelemetryFlag::VoiceDrift`].
pub const VOICE_DRIFT_BELOW: u8 = 60;

/// Reference voice in the [`LexicalEmbedder`] feature space: moderate
/// length, some questions, no exclamations, warm and signature-heavy, no
/// directive or robotic phrasing.
pub const DEFAULT_REFERENCE_VOICE: [f64; LEXICAL_DIMENSIONS] =
    [0.25, 0.1, 0.0, 0.15, 0.3, 0.0, 0.3, 0.0];

/// Number of features produced by [`LexicalEmbedder`].
pub const LEXICAL_DIMENSIONS: usize = 8;

const SIGNATURE_PHRASES: &[&str] = &[
    "i hear you",
    "makes sense",
    "let's figure this out",
    "you're carrying",
    "your nervous system",
    "permission to",
    "slow this down",
];

const ROBOTIC_PHRASES: &[&str] = &[
    "i understand",
    "i apologize",
    "certainly",
    "furthermore",
    "regarding",
    "please note",
];

static WARMTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(you|we|let's|your|our)\b").unwrap());

static DIRECTIVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(should|must|need to|have to|required)\b").unwrap());

/// Produces a fixed-length vector describing the voice of a piece of text.
#[async_trait]
pub trait VoiceEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ToneError>;

    /// How this embedder's vectors are derived, reported in tone details.
    fn method(&self) -> ComparisonMethod {
        ComparisonMethod::Embedding
    }
}

/// Pseudo-embedding built from cheap lexical features.
///
/// Dimensions, each capped at 1.0:
/// 0. length / 1000
/// 1. question marks / 10
/// 2. exclamation marks / 10
/// 3. periods / 20
/// 4. warmth words (you, we, let's, your, our) / 20
/// 5. directive words (should, must, need to, have to, required) / 20
/// 6. fraction of signature phrases present
/// 7. fraction of robotic phrases present
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalEmbedder;

impl LexicalEmbedder {
    pub fn features(text: &str) -> [f64; LEXICAL_DIMENSIONS] {
        let lower = text.to_lowercase().replace('’', "'");
        let count = |c: char| text.chars().filter(|&ch| ch == c).count() as f64;
        let phrase_fraction = |phrases: &[&str]| {
            phrases.iter().filter(|p| lower.contains(*p)).count() as f64 / phrases.len() as f64
        };

        [
            text.chars().count() as f64 / 1000.0,
            count('?') / 10.0,
            count('!') / 10.0,
            count('.') / 20.0,
            WARMTH_REGEX.find_iter(&lower).count() as f64 / 20.0,
            DIRECTIVE_REGEX.find_iter(&lower).count() as f64 / 20.0,
            phrase_fraction(SIGNATURE_PHRASES),
            phrase_fraction(ROBOTIC_PHRASES),
        ]
        .map(|v| v.min(1.0))
    }
}

#[async_trait]
impl VoiceEmbedder for LexicalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ToneError> {
        Ok(Self::features(text).to_vec())
    }

    fn method(&self) -> ComparisonMethod {
        ComparisonMethod::Lexical
    }
}

/// How the tone comparison was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMethod {
    Lexical,
    Embedding,
    /// No comparison was possible (no text, or the embedder failed).
    Unavailable,
}

impl fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Embedding => write!(f, "embedding"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneDetails {
    pub cosine_similarity: f64,
    pub vector_magnitude: f64,
    pub reference_magnitude: f64,
    pub comparison_method: ComparisonMethod,
}

impl ToneDetails {
    fn unavailable(reference_magnitude: f64) -> Self {
        Self {
            cosine_similarity: 0.0,
            vector_magnitude: 0.0,
            reference_magnitude,
            comparison_method: ComparisonMethod::Unavailable,
        }
    }
}

/// Score and details from one tone inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneReport {
    pub score: u8,
    pub details: ToneDetails,
}

impl ToneReport {
    pub fn flags(&self) -> Vec<TelemetryFlag> {
        if self.score < VOICE_DRIFT_BELOW {
            vec![TelemetryFlag::VoiceDrift]
        } else {
            Vec::new()
        }
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, ToneError> {
    if a.len() != b.len() {
        return Err(ToneError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let (ma, mb) = (magnitude(a), magnitude(b));
    if ma == 0.0 || mb == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (ma * mb))
}

fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Compares assistant text against a reference voice.
#[derive(Clone)]
pub struct ToneInspector {
    embedder: Arc<dyn VoiceEmbedder>,
    reference_voice: Vec<f64>,
    timeout: Duration,
}

impl fmt::Debug for ToneInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToneInspector")
            .field("method", &self.embedder.method())
            .field("reference_voice", &self.reference_voice)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ToneInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneInspector {
    /// Lexical embedder, default reference voice and 2 s deadline.
    pub fn new() -> Self {
        Self {
            embedder: Arc::new(LexicalEmbedder),
            reference_voice: DEFAULT_REFERENCE_VOICE.to_vec(),
            timeout: DEFAULT_TONE_TIMEOUT,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn VoiceEmbedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Replace the reference voice. Its length must match what the
    /// embedder produces, or every inspection scores 0.
    pub fn with_reference_voice(mut self, reference: Vec<f64>) -> Self {
        self.reference_voice = reference;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn reference_voice(&self) -> &[f64] {
        &self.reference_voice
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Score the assistant text of `event`. Never fails.
    ///
    /// Missing or blank assistant text scores 0: silence from the assistant
    /// is treated as a failure, not as neutral.
    pub async fn inspect(&self, event: &TelemetryEvent) -> ToneReport {
        let reference_magnitude = magnitude(&self.reference_voice);
        let Some(text) = event.assistant_text() else {
            debug!(session_id = %event.session_id, "No assistant text, tone score is 0");
            return ToneReport {
                score: 0,
                details: ToneDetails::unavailable(reference_magnitude),
            };
        };

        match self.compare(text).await {
            Ok(details) => {
                let score = (details.cosine_similarity * 100.0).floor().clamp(0.0, 100.0) as u8;
                ToneReport { score, details }
            }
            Err(e) => {
                warn!(
                    session_id = %event.session_id,
                    error = %e,
                    "Tone comparison failed, scoring 0"
                );
                ToneReport {
                    score: 0,
                    details: ToneDetails::unavailable(reference_magnitude),
                }
            }
        }
    }

    async fn compare(&self, text: &str) -> Result<ToneDetails, ToneError> {
        let vector = self.embed(text).await?;
        if vector.is_empty() {
            return Err(ToneError::EmptyEmbedding);
        }
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(ToneError::MalformedEmbedding { index });
        }
        let similarity = cosine_similarity(&vector, &self.reference_voice)?;
        if !similarity.is_finite() {
            return Err(ToneError::NonFiniteSimilarity(similarity));
        }
        Ok(ToneDetails {
            cosine_similarity: similarity,
            vector_magnitude: magnitude(&vector),
            reference_magnitude: magnitude(&self.reference_voice),
            comparison_method: self.embedder.method(),
        })
    }

    /// Run the embedder on its own task under the deadline. The task is
    /// aborted on timeout and a panic inside it surfaces as an error.
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ToneError> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        let mut handle = tokio::spawn(async move { embedder.embed(&text).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => Err(ToneError::Panicked(e.to_string())),
            Ok(Err(e)) => Err(ToneError::Backend(e.to_string())),
            Err(_) => {
                handle.abort();
                Err(ToneError::Timeout(self.timeout))
            }
        }
    }
}
