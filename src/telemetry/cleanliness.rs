//! Structural cleanliness checks.
//!
//! Every check runs over the student and assistant text concatenated, plus
//! the extracted-slot list. The score starts at 100 and each failed check
//! subtracts a fixed penalty; the result is clamped to `[0, 100]`.
//!
//! | Check                         | Penalty |
//! |-------------------------------|---------|
//! | code fences                   | 20      |
//! | hallucination markers         | 40      |
//! | unicode issues                | 15      |
//! | empty (< 3 chars trimmed)     | 20      |
//! | overlong (> 3000 chars)       | 10      |
//! | duplicate extracted slots     | 15      |
//! | malformed embedded JSON       | 10      |
//! | excessive capitalization      | 5       |
//! | excessive punctuation         | 5       |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::telemetry::event::TelemetryEvent;
use crate::telemetry::flags::TelemetryFlag;

const FENCE_PENALTY: i32 = 20;
const HALLUCINATION_PENALTY: i32 = 40;
const UNICODE_PENALTY: i32 = 15;
const EMPTY_PENALTY: i32 = 20;
const OVERLONG_PENALTY: i32 = 10;
const DUPLICATE_SLOT_PENALTY: i32 = 15;
const MALFORMED_JSON_PENALTY: i32 = 10;
const CAPS_PENALTY: i32 = 5;
const PUNCTUATION_PENALTY: i32 = 5;

const MIN_TEXT_CHARS: usize = 3;
const MAX_TEXT_CHARS: usize = 3000;
const CAPS_RATIO_LIMIT: f64 = 0.3;
const CAPS_MIN_CHARS: usize = 50;
const PUNCTUATION_RUN_LIMIT: usize = 2;

/// Disclaimer phrases that suggest the model broke character.
static HALLUCINATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)as an ai",
        r"(?i)i('m| am) (an? )?ai",
        r"(?i)i don['’]t have personal",
        r"(?i)i don['’]t have feelings",
        r"(?i)i('m| am) a language model",
        r"(?i)i('m| am) not capable of",
        r"(?i)i don['’]t have the ability",
        r"(?i)i cannot actually",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static JSON_FRAGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());

static PUNCTUATION_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[!?]{2,}").unwrap());

/// Outcome of every cleanliness check for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanlinessDetails {
    pub has_code_fences: bool,
    pub has_hallucination_markers: bool,
    pub has_unicode_issues: bool,
    pub is_empty: bool,
    pub is_overlong: bool,
    pub has_duplicate_slots: bool,
    pub has_malformed_json: bool,
    pub has_excessive_caps: bool,
    pub has_excessive_punctuation: bool,
    /// Length of the combined text in characters.
    pub message_length: usize,
    /// Human-readable reason for each penalty applied, in check order.
    pub penalty_reasons: Vec<String>,
}

impl CleanlinessDetails {
    /// Run every check against `event`.
    pub fn inspect(event: &TelemetryEvent) -> Self {
        let text = event.combined_text();
        let message_length = text.chars().count();

        let mut details = Self {
            has_code_fences: text.contains("```"),
            has_hallucination_markers: has_hallucination_markers(&text),
            has_unicode_issues: has_unicode_issues(&text),
            is_empty: text.trim().chars().count() < MIN_TEXT_CHARS,
            is_overlong: message_length > MAX_TEXT_CHARS,
            has_duplicate_slots: has_duplicates(&event.extracted_slots),
            has_malformed_json: has_malformed_json(&text),
            has_excessive_caps: has_excessive_caps(&text, message_length),
            has_excessive_punctuation: PUNCTUATION_RUN_REGEX.find_iter(&text).count()
                > PUNCTUATION_RUN_LIMIT,
            message_length,
            penalty_reasons: Vec::new(),
        };
        details.penalty_reasons = details
            .penalties()
            .into_iter()
            .map(|(reason, _)| reason)
            .collect();
        details
    }

    /// Each applicable penalty with its reason.
    fn penalties(&self) -> Vec<(String, i32)> {
        let mut penalties = Vec::new();
        if self.has_code_fences {
            penalties.push(("code fences detected".to_string(), FENCE_PENALTY));
        }
        if self.has_hallucination_markers {
            penalties.push((
                "hallucination markers detected".to_string(),
                HALLUCINATION_PENALTY,
            ));
        }
        if self.has_unicode_issues {
            penalties.push(("unicode issues detected".to_string(), UNICODE_PENALTY));
        }
        if self.is_empty {
            penalties.push(("empty or too-short message".to_string(), EMPTY_PENALTY));
        }
        if self.is_overlong {
            penalties.push((
                format!("overlong message ({} chars)", self.message_length),
                OVERLONG_PENALTY,
            ));
        }
        if self.has_duplicate_slots {
            penalties.push(("duplicate slots detected".to_string(), DUPLICATE_SLOT_PENALTY));
        }
        if self.has_malformed_json {
            penalties.push(("malformed JSON detected".to_string(), MALFORMED_JSON_PENALTY));
        }
        if self.has_excessive_caps {
            penalties.push(("excessive capitalization".to_string(), CAPS_PENALTY));
        }
        if self.has_excessive_punctuation {
            penalties.push(("excessive punctuation".to_string(), PUNCTUATION_PENALTY));
        }
        penalties
    }

    /// Score in `[0, 100]`.
    pub fn score(&self) -> u8 {
        let total: i32 = self.penalties().iter().map(|(_, p)| p).sum();
        (100 - total).clamp(0, 100) as u8
    }

    /// Inspector-specific flags. Threshold flags are added by the aggregator.
    pub fn flags(&self) -> Vec<TelemetryFlag> {
        let mut flags = Vec::new();
        if self.has_code_fences {
            flags.push(TelemetryFlag::FormattingFences);
        }
        if self.has_hallucination_markers {
            flags.push(TelemetryFlag::HallucinationMarkers);
        }
        if self.has_unicode_issues {
            flags.push(TelemetryFlag::UnicodeIssues);
        }
        if self.is_empty {
            flags.push(TelemetryFlag::EmptyMessage);
        }
        if self.is_overlong {
            flags.push(TelemetryFlag::OverlongMessage);
        }
        if self.has_duplicate_slots {
            flags.push(TelemetryFlag::SlotDuplication);
        }
        if self.has_malformed_json {
            flags.push(TelemetryFlag::MalformedJson);
        }
        flags
    }
}

/// Cleanliness score for `event` in `[0, 100]`.
pub fn score_cleanliness(event: &TelemetryEvent) -> u8 {
    CleanlinessDetails::inspect(event).score()
}

fn has_hallucination_markers(text: &str) -> bool {
    HALLUCINATION_PATTERNS.iter().any(|p| p.is_match(text))
}

/// Replacement character, zero-width characters, BOM, or a control
/// character other than tab, newline and carriage return.
fn has_unicode_issues(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c, '\u{FFFD}' | '\u{200B}'..='\u{200D}' | '\u{FEFF}')
            || (matches!(c, '\u{0}'..='\u{1F}') && !matches!(c, '\t' | '\n' | '\r'))
    })
}

fn has_duplicates(slots: &[String]) -> bool {
    let mut seen = HashSet::new();
    slots.iter().any(|slot| !seen.insert(slot.as_str()))
}

/// Only the first brace-delimited fragment is parsed.
fn has_malformed_json(text: &str) -> bool {
    if !(text.contains('{') && text.contains('}')) {
        return false;
    }
    JSON_FRAGMENT_REGEX
        .find(text)
        .is_some_and(|m| serde_json::from_str::<serde_json::Value>(m.as_str()).is_err())
}

fn has_excessive_caps(text: &str, length: usize) -> bool {
    if length <= CAPS_MIN_CHARS {
        return false;
    }
    let upper = text.chars().filter(|c| c.is_ascii_uppercase()).count();
    upper as f64 / length as f64 > CAPS_RATIO_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::Phase;

    fn event_with(assistant: &str) -> TelemetryEvent {
        TelemetryEvent::new("test", Phase::Rapport).with_assistant_message(assistant)
    }

    // =========================================
    // Scoring
    // =========================================

    #[test]
    fn test_clean_message_scores_full() {
        let details = CleanlinessDetails::inspect(&event_with(
            "That makes sense. What made you start thinking about college?",
        ));
        assert_eq!(details.score(), 100);
        assert!(details.penalty_reasons.is_empty());
        assert!(details.flags().is_empty());
    }

    #[test]
    fn test_empty_message_penalized() {
        let details = CleanlinessDetails::inspect(&event_with(""));
        assert!(details.is_empty);
        assert_eq!(details.score(), 80);
        assert_eq!(details.flags(), vec![TelemetryFlag::EmptyMessage]);
    }

    #[test]
    fn test_fence_scores_strictly_lower() {
        let plain = score_cleanliness(&event_with("Here is a plan for your essay."));
        let fenced = score_cleanliness(&event_with("Here is a plan for your essay.```"));
        assert!(fenced < plain);
        assert_eq!(plain - fenced, 20);
    }

    #[test]
    fn test_hallucination_penalty_applied_once() {
        let details = CleanlinessDetails::inspect(&event_with(
            "As an AI, I don't have feelings and I'm a language model.",
        ));
        assert!(details.has_hallucination_markers);
        assert_eq!(details.score(), 60);
    }

    #[test]
    fn test_curly_apostrophe_matches_marker() {
        assert!(has_hallucination_markers("Honestly I don’t have personal opinions"));
    }

    #[test]
    fn test_penalties_compound_and_clamp() {
        let event = TelemetryEvent::new("test", Phase::Rapport)
            .with_assistant_message("```As an AI\u{FFFD} {not json}")
            .with_extracted_slots(["a", "a"]);
        let details = CleanlinessDetails::inspect(&event);
        // 20 + 40 + 15 + 15 + 10 = 100
        assert_eq!(details.score(), 0);
    }

    // =========================================
    // Individual checks
    // =========================================

    #[test]
    fn test_unicode_issues_ignore_whitespace_controls() {
        assert!(!has_unicode_issues("line one\nline two\tindented\r\n"));
        assert!(has_unicode_issues("zero\u{200B}width"));
        assert!(has_unicode_issues("bell\u{7}"));
        assert!(has_unicode_issues("\u{FEFF}bom"));
    }

    #[test]
    fn test_malformed_json_only_checks_first_fragment() {
        assert!(!has_malformed_json(r#"{"slot": "ok"} and {broken"#));
        assert!(has_malformed_json("{slot: missing quotes}"));
        assert!(!has_malformed_json("no braces here"));
    }

    #[test]
    fn test_overlong_message() {
        let details = CleanlinessDetails::inspect(&event_with(&"a".repeat(3001)));
        assert!(details.is_overlong);
        assert_eq!(details.message_length, 3001);
        assert!(details.flags().contains(&TelemetryFlag::OverlongMessage));
    }

    #[test]
    fn test_message_at_length_limit_is_not_overlong() {
        let details = CleanlinessDetails::inspect(&event_with(&"a".repeat(3000)));
        assert!(!details.is_overlong);
        assert_eq!(details.message_length, 3000);
        assert!(!details.flags().contains(&TelemetryFlag::OverlongMessage));
    }

    #[test]
    fn test_empty_threshold_counts_trimmed_chars() {
        assert!(CleanlinessDetails::inspect(&event_with("  ab  ")).is_empty);
        assert!(!CleanlinessDetails::inspect(&event_with("  abc  ")).is_empty);
        // Counted in chars, not bytes
        assert!(!CleanlinessDetails::inspect(&event_with("héé")).is_empty);
        assert!(CleanlinessDetails::inspect(&event_with("éé")).is_empty);
    }

    #[test]
    fn test_duplicate_slots() {
        let event = event_with("Thanks for sharing that with me.")
            .with_extracted_slots(["emotional_state", "emotional_state"]);
        let details = CleanlinessDetails::inspect(&event);
        assert!(details.has_duplicate_slots);
        assert_eq!(details.score(), 85);
        assert_eq!(details.flags(), vec![TelemetryFlag::SlotDuplication]);
    }

    #[test]
    fn test_caps_and_punctuation() {
        let shouting = "THIS IS REALLY IMPORTANT AND YOU NEED TO LISTEN TO ME NOW";
        let details = CleanlinessDetails::inspect(&event_with(shouting));
        assert!(details.has_excessive_caps);

        let details = CleanlinessDetails::inspect(&event_with("What?? Really!! No way?!"));
        assert!(details.has_excessive_punctuation);
        assert_eq!(details.score(), 95);
    }

    #[test]
    fn test_combined_text_includes_student() {
        let event = TelemetryEvent::new("test", Phase::Rapport)
            .with_student_message("ok")
            .with_assistant_message("");
        assert!(CleanlinessDetails::inspect(&event).is_empty);

        let event = event.with_student_message("I'm doing fine, thanks");
        assert!(!CleanlinessDetails::inspect(&event).is_empty);
    }
}
