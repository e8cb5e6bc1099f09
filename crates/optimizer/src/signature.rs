//! Context signals and the signature derived from them.
//!
//! Prompt metrics are tracked per signature so the optimizer can learn that
//! one prompt suits, say, beginners in the brainstorming phase while another
//! suits experienced writers revising a draft.

use serde::{Deserialize, Serialize};

/// Signals extracted from the raw context sources for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_phase: Option<String>,
    /// User turns so far in the conversation
    #[serde(default)]
    pub conversation_length: usize,
    #[serde(default)]
    pub has_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

impl ContextSignals {
    pub fn length_bucket(&self) -> &'static str {
        match self.conversation_length {
            0..=4 => "short",
            5..=14 => "medium",
            _ => "long",
        }
    }

    /// Sorted, pipe-joined `key=value` features. Missing optional fields
    /// are omitted.
    pub fn signature(&self) -> String {
        let mut features = vec![
            format!("length={}", self.length_bucket()),
            format!("errors={}", self.has_errors),
        ];
        if let Some(level) = &self.experience_level {
            features.push(format!("experience={}", level.to_lowercase()));
        }
        if let Some(phase) = &self.essay_phase {
            features.push(format!("phase={}", phase.to_lowercase()));
        }
        if let Some(mood) = &self.mood {
            features.push(format!("mood={}", mood.to_lowercase()));
        }
        features.sort();
        features.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_sorted_and_omits_missing_fields() {
        let signals = ContextSignals {
            experience_level: Some("Beginner".into()),
            essay_phase: None,
            conversation_length: 7,
            has_errors: false,
            mood: Some("frustrated".into()),
        };
        assert_eq!(
            signals.signature(),
            "errors=false|experience=beginner|length=medium|mood=frustrated"
        );
    }

    #[test]
    fn length_buckets() {
        let mut s = ContextSignals::default();
        assert_eq!(s.length_bucket(), "short");
        s.conversation_length = 5;
        assert_eq!(s.length_bucket(), "medium");
        s.conversation_length = 15;
        assert_eq!(s.length_bucket(), "long");
    }
}
