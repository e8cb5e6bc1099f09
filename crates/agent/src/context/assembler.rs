//! Context assembly pipeline.
//!
//! Turns the raw per-turn sources into scored [`ContextElement`]s, then
//! enforces the token budget by dropping the lowest-relevance elements
//! first. Assembly is deterministic apart from the measured retrieval time.

use crate::context::token;
use crate::profile::UserProfile;
use chrono::{DateTime, Utc};
use inkwell_config::ContextConfig;
use inkwell_core::message::{Message, Role};
use inkwell_memory::keywords::extract_keywords;
use inkwell_optimizer::ContextSignals;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::debug;

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    History,
    Profile,
    SessionStats,
    Patterns,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Profile => "profile",
            Self::SessionStats => "session_stats",
            Self::Patterns => "patterns",
        }
    }

    fn weight(&self) -> f32 {
        match self {
            Self::Profile => 0.9,
            Self::History => 0.7,
            Self::Patterns => 0.6,
            Self::SessionStats => 0.5,
        }
    }
}

/// One scored piece of context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextElement {
    pub source: ContextSource,
    pub content: String,
    /// 0.0–1.0
    pub relevance_score: f32,
    pub token_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl ContextElement {
    pub fn new(source: ContextSource, content: impl Into<String>, relevance_score: f32) -> Self {
        let content = content.into();
        Self {
            token_count: token::estimate_tokens(&content),
            source,
            content,
            relevance_score: relevance_score.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }
}

/// The bounded context for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub query: String,
    /// Kept elements in their original order
    pub elements: Vec<ContextElement>,
    pub total_tokens: usize,
    pub retrieval_time_ms: u64,
    pub was_trimmed: bool,
    pub signals: ContextSignals,
}

impl RetrievedContext {
    /// Distinct sources present, in order of first appearance.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for element in &self.elements {
            let name = element.source.as_str().to_string();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Plain-text rendering for a prompt.
    pub fn render(&self) -> String {
        if self.elements.is_empty() {
            return "(no prior context)".into();
        }
        self.elements
            .iter()
            .map(|e| format!("[{}] {}", e.source.as_str(), e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything the assembler draws from for a single turn.
pub struct RawSources<'a> {
    /// The current user input
    pub query: &'a str,
    /// Conversation so far, oldest first, excluding the current input
    pub history: &'a [Message],
    /// Profile with the mood for this turn already resolved
    pub profile: &'a UserProfile,
    pub session_stats: Option<String>,
    pub pattern_summaries: &'a [String],
    pub has_errors: bool,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless apart from its limits.
pub struct ContextAssembler {
    token_budget: usize,
    history_turns: usize,
}

impl ContextAssembler {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            token_budget: config.token_budget,
            history_turns: config.history_turns,
        }
    }

    pub fn with_budget(token_budget: usize) -> Self {
        Self {
            token_budget,
            history_turns: ContextConfig::default().history_turns,
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Score every source, extract signals, and trim to the budget.
    pub fn assemble(&self, sources: &RawSources<'_>) -> RetrievedContext {
        let query_keywords: BTreeSet<String> = extract_keywords(sources.query).into_iter().collect();
        let score = |source: ContextSource, content: &str, recency: f32| {
            let overlap = if query_keywords.is_empty() {
                0.0
            } else {
                let hits = extract_keywords(content)
                    .into_iter()
                    .filter(|k| query_keywords.contains(k))
                    .count();
                hits as f32 / query_keywords.len() as f32
            };
            0.5 * overlap.min(1.0) + 0.3 * source.weight() + 0.2 * recency
        };

        let mut elements = Vec::new();

        if !sources.profile.is_empty() {
            let p = sources.profile;
            let mut parts = Vec::new();
            if let Some(level) = &p.experience_level {
                parts.push(format!("experience level: {level}"));
            }
            if let Some(phase) = &p.essay_phase {
                parts.push(format!("essay phase: {phase}"));
            }
            if let Some(mood) = &p.mood {
                parts.push(format!("mood: {mood}"));
            }
            let content = parts.join("; ");
            let relevance = score(ContextSource::Profile, &content, 1.0);
            elements.push(ContextElement::new(ContextSource::Profile, content, relevance));
        }

        if let Some(stats) = &sources.session_stats {
            let relevance = score(ContextSource::SessionStats, stats, 1.0);
            elements.push(ContextElement::new(ContextSource::SessionStats, stats.clone(), relevance));
        }

        for summary in sources.pattern_summaries {
            let relevance = score(ContextSource::Patterns, summary, 1.0);
            elements.push(ContextElement::new(ContextSource::Patterns, summary.clone(), relevance));
        }

        let window = sources.history.len().saturating_sub(self.history_turns * 2);
        let recent = &sources.history[window..];
        for (i, message) in recent.iter().enumerate() {
            let age = recent.len() - 1 - i;
            let speaker = match message.role {
                Role::User => "user",
                Role::Assistant => "coach",
            };
            let content = format!("{speaker}: {}", message.content);
            let relevance = score(ContextSource::History, &message.content, 1.0 / (1.0 + age as f32));
            let mut element = ContextElement::new(ContextSource::History, content, relevance);
            element.timestamp = message.timestamp;
            elements.push(element);
        }

        let mut context = self.assemble_elements(sources.query, elements);
        context.signals = ContextSignals {
            experience_level: sources.profile.experience_level.clone(),
            essay_phase: sources.profile.essay_phase.clone(),
            conversation_length: sources.history.iter().filter(|m| m.role == Role::User).count(),
            has_errors: sources.has_errors,
            mood: sources.profile.mood.clone(),
        };
        context
    }

    /// Trim `elements` to the token budget, lowest relevance first (ties drop
    /// the older element). Surviving elements keep their order.
    pub fn assemble_elements(&self, query: &str, mut elements: Vec<ContextElement>) -> RetrievedContext {
        let started = Instant::now();
        let mut total: usize = elements.iter().map(|e| e.token_count).sum();
        let mut dropped = 0usize;

        while total > self.token_budget {
            let Some(victim) = elements
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.relevance_score
                        .total_cmp(&b.relevance_score)
                        .then(a.timestamp.cmp(&b.timestamp))
                })
                .map(|(i, _)| i)
            else {
                break;
            };
            let removed = elements.remove(victim);
            total -= removed.token_count;
            dropped += 1;
        }

        if dropped > 0 {
            debug!(dropped, total_tokens = total, budget = self.token_budget, "Context trimmed");
        }

        RetrievedContext {
            query: query.to_string(),
            elements,
            total_tokens: total,
            retrieval_time_ms: started.elapsed().as_millis() as u64,
            was_trimmed: dropped > 0,
            signals: ContextSignals::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(source: ContextSource, tokens: usize, relevance: f32) -> ContextElement {
        ContextElement::new(source, "x".repeat(tokens * 4), relevance)
    }

    #[test]
    fn over_budget_is_trimmed_to_fit() {
        let assembler = ContextAssembler::with_budget(500);
        let elements = (0..10)
            .map(|i| element(ContextSource::History, 100, i as f32 / 10.0))
            .collect();
        let ctx = assembler.assemble_elements("q", elements);
        assert!(ctx.total_tokens <= 500);
        assert!(ctx.was_trimmed);
        // the five most relevant survive
        assert_eq!(ctx.elements.len(), 5);
        assert!(ctx.elements.iter().all(|e| e.relevance_score >= 0.5));
    }

    #[test]
    fn within_budget_is_untouched() {
        let assembler = ContextAssembler::with_budget(500);
        let ctx = assembler.assemble_elements("q", vec![element(ContextSource::Profile, 10, 0.1)]);
        assert!(!ctx.was_trimmed);
        assert_eq!(ctx.total_tokens, 10);
    }

    #[test]
    fn oversized_single_element_is_dropped() {
        let assembler = ContextAssembler::with_budget(50);
        let ctx = assembler.assemble_elements("q", vec![element(ContextSource::History, 80, 1.0)]);
        assert!(ctx.elements.is_empty());
        assert_eq!(ctx.total_tokens, 0);
        assert!(ctx.was_trimmed);
    }

    #[test]
    fn assemble_scores_and_extracts_signals() {
        let assembler = ContextAssembler::new(&ContextConfig::default());
        let history = vec![
            Message::user("I want to write about my grandmother"),
            Message::assistant("Tell me about her garden."),
            Message::user("She grew tomatoes"),
        ];
        let profile = UserProfile {
            experience_level: Some("beginner".into()),
            essay_phase: Some("drafting".into()),
            mood: None,
        };
        let summaries = vec!["brainstorm used 4 times".to_string()];
        let ctx = assembler.assemble(&RawSources {
            query: "more about grandmother tomatoes",
            history: &history,
            profile: &profile,
            session_stats: Some("3 turns so far".into()),
            pattern_summaries: &summaries,
            has_errors: true,
        });

        assert_eq!(ctx.signals.conversation_length, 2);
        assert!(ctx.signals.has_errors);
        assert_eq!(ctx.signals.signature(), "errors=true|experience=beginner|length=short|phase=drafting");
        assert_eq!(ctx.sources(), vec!["profile", "session_stats", "patterns", "history"]);

        let history_scores: Vec<f32> = ctx
            .elements
            .iter()
            .filter(|e| e.source == ContextSource::History)
            .map(|e| e.relevance_score)
            .collect();
        // newest turn mentions the query and is the most recent
        assert!(history_scores[2] > history_scores[1]);
        assert!(ctx.render().contains("[history] user: She grew tomatoes"));
    }

    #[test]
    fn history_window_is_bounded() {
        let assembler = ContextAssembler::new(&ContextConfig {
            token_budget: 10_000,
            history_turns: 1,
        });
        let history: Vec<Message> = (0..6).map(|i| Message::user(format!("turn {i}"))).collect();
        let ctx = assembler.assemble(&RawSources {
            query: "hi",
            history: &history,
            profile: &UserProfile::default(),
            session_stats: None,
            pattern_summaries: &[],
            has_errors: false,
        });
        assert_eq!(ctx.elements.len(), 2);
        assert_eq!(ctx.signals.conversation_length, 6);
    }
}
