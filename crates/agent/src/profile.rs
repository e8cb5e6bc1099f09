//! Per-user writing profile, persisted under the `profile` key.

use serde::{Deserialize, Serialize};

/// Store key the profile lives under.
pub const PROFILE_KEY: &str = "profile";

const FRUSTRATION_MARKERS: &[&str] = &[
    "frustrat", "stuck", "blocked", "give up", "hate", "annoyed", "ugh", "can't do this",
    "overwhelmed", "hopeless",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// e.g. "beginner", "intermediate", "advanced"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    /// e.g. "brainstorming", "drafting", "revising"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_phase: Option<String>,
    /// Set explicitly; otherwise inferred per turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

impl UserProfile {
    /// The profile as seen for one turn: an explicit mood wins, otherwise
    /// mood is inferred from the input.
    pub fn for_turn(&self, input: &str) -> Self {
        let mut profile = self.clone();
        if profile.mood.is_none() {
            profile.mood = infer_mood(input);
        }
        profile
    }

    pub fn is_empty(&self) -> bool {
        self.experience_level.is_none() && self.essay_phase.is_none() && self.mood.is_none()
    }
}

/// `Some("frustrated")` when the input carries frustration markers.
/// Single-word markers match word prefixes, phrases match anywhere.
pub fn infer_mood(input: &str) -> Option<String> {
    let lower = input.to_lowercase();
    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    FRUSTRATION_MARKERS
        .iter()
        .any(|m| {
            if m.contains(' ') {
                lower.contains(m)
            } else {
                words.iter().any(|w| w.starts_with(m))
            }
        })
        .then(|| "frustrated".to_string())
}
