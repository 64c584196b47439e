//! Per-turn telemetry events.
//!
//! ## Example
//!
//! ```
//! use cadence::telemetry::{RetrievedChunk, TelemetryEvent};
//! use cadence_common::Phase;
//!
//! let event = TelemetryEvent::new("session-42", Phase::Rapport)
//!     .with_student_message("I'm nervous about applications")
//!     .with_assistant_message("I hear you. Let's slow this down together.")
//!     .with_extracted_slots(["emotional_state"])
//!     .with_required_slots(["student_background", "emotional_state", "motivation_reason"])
//!     .add_chunk(RetrievedChunk::new("chunk-1", 0.82))
//!     .with_turn_number(2);
//!
//! assert_eq!(event.extracted_slots.len(), 1);
//! assert_eq!(event.retrieved_chunks[0].score, 0.82);
//! ```

use cadence_common::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item of retrieved context with its relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl RetrievedChunk {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Immutable snapshot of one turn, submitted once per turn for scoring.
///
/// No field beyond the session id, timestamp and phase is required. Each
/// inspector treats a missing message or an empty list as "not applicable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<String>,
    /// Slots extracted this turn. Empty when not supplied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_slots: Vec<String>,
    /// Slots the current phase requires. Empty when not supplied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_chunks: Vec<RetrievedChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_number: Option<u32>,
}

impl TelemetryEvent {
    /// Create an event stamped with the current time.
    pub fn new(session_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            phase,
            student_message: None,
            assistant_message: None,
            extracted_slots: Vec::new(),
            required_slots: Vec::new(),
            retrieved_chunks: Vec::new(),
            turn_number: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_student_message(mut self, message: impl Into<String>) -> Self {
        self.student_message = Some(message.into());
        self
    }

    pub fn with_assistant_message(mut self, message: impl Into<String>) -> Self {
        self.assistant_message = Some(message.into());
        self
    }

    pub fn with_extracted_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extracted_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_chunk(mut self, chunk: RetrievedChunk) -> Self {
        self.retrieved_chunks.push(chunk);
        self
    }

    pub fn with_chunks(mut self, chunks: impl IntoIterator<Item = RetrievedChunk>) -> Self {
        self.retrieved_chunks.extend(chunks);
        self
    }

    pub fn with_turn_number(mut self, turn: u32) -> Self {
        self.turn_number = Some(turn);
        self
    }

    /// Student and assistant text concatenated, as the cleanliness checks see it.
    pub fn combined_text(&self) -> String {
        let mut text = String::new();
        if let Some(student) = &self.student_message {
            text.push_str(student);
        }
        if let Some(assistant) = &self.assistant_message {
            text.push_str(assistant);
        }
        text
    }

    /// Assistant text, treating whitespace-only text as absent.
    pub fn assistant_text(&self) -> Option<&str> {
        self.assistant_message
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}
