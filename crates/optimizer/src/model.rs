//! Data model for prompt performance tracking: metrics, variants,
//! experiments and the recommendations report.

use chrono::{DateTime, Duration, Utc};
use inkwell_config::{OptimizerConfig, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Neutral value for a score component with no observations yet.
const NEUTRAL: f64 = 0.5;

/// The observed result of one use of a prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub response_time_ms: f64,
    pub confidence: f64,
    /// User satisfaction on a 1–5 scale, when known
    pub satisfaction: Option<f64>,
}

impl Outcome {
    pub fn success(response_time_ms: f64, confidence: f64) -> Self {
        Self {
            success: true,
            response_time_ms,
            confidence,
            satisfaction: None,
        }
    }

    pub fn failure(response_time_ms: f64) -> Self {
        Self {
            success: false,
            response_time_ms,
            confidence: 0.0,
            satisfaction: None,
        }
    }
}

/// Window sizes and weights that metrics are computed with.
#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub alpha: f64,
    pub satisfaction_window: usize,
    pub recency_window: usize,
    pub latency_ceiling_ms: f64,
    pub weights: ScoreWeights,
}

impl From<&OptimizerConfig> for MetricsSettings {
    fn from(config: &OptimizerConfig) -> Self {
        Self {
            alpha: config.ema_alpha,
            satisfaction_window: config.satisfaction_window,
            recency_window: config.recency_window,
            latency_ceiling_ms: config.latency_ceiling_ms,
            weights: config.score_weights,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self::from(&OptimizerConfig::default())
    }
}

/// Running performance of one prompt (overall or within one context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPerformanceMetrics {
    pub prompt_id: String,
    pub total_uses: u64,
    pub successful_uses: u64,
    /// EMA of response time, seeded from the first observation
    pub average_response_time_ms: f64,
    /// EMA of decision confidence, seeded from the first observation
    pub average_confidence: f64,
    /// Last N satisfaction scores (1–5)
    pub satisfaction_scores: VecDeque<f64>,
    /// Last N success flags
    pub recent_outcomes: VecDeque<bool>,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn ema(previous: f64, observed: f64, alpha: f64, first: bool) -> f64 {
    if first { observed } else { alpha * observed + (1.0 - alpha) * previous }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, value: T, cap: usize) {
    ring.push_back(value);
    while ring.len() > cap.max(1) {
        ring.pop_front();
    }
}

impl PromptPerformanceMetrics {
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            total_uses: 0,
            successful_uses: 0,
            average_response_time_ms: 0.0,
            average_confidence: 0.0,
            satisfaction_scores: VecDeque::new(),
            recent_outcomes: VecDeque::new(),
            last_used: None,
            created_at: Utc::now(),
        }
    }

    pub fn record(&mut self, outcome: &Outcome, settings: &MetricsSettings) {
        let first = self.total_uses == 0;
        self.total_uses += 1;
        if outcome.success {
            self.successful_uses += 1;
        }
        self.average_response_time_ms = ema(
            self.average_response_time_ms,
            outcome.response_time_ms.max(0.0),
            settings.alpha,
            first,
        );
        self.average_confidence = ema(
            self.average_confidence,
            outcome.confidence.clamp(0.0, 1.0),
            settings.alpha,
            first,
        );
        push_bounded(&mut self.recent_outcomes, outcome.success, settings.recency_window);
        if let Some(score) = outcome.satisfaction {
            self.add_satisfaction(score, settings);
        }
        self.last_used = Some(Utc::now());
    }

    pub fn add_satisfaction(&mut self, score: f64, settings: &MetricsSettings) {
        push_bounded(
            &mut self.satisfaction_scores,
            score.clamp(1.0, 5.0),
            settings.satisfaction_window,
        );
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_uses == 0 {
            0.0
        } else {
            self.successful_uses as f64 / self.total_uses as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Mean satisfaction mapped from 1–5 onto 0–1.
    pub fn normalized_satisfaction(&self) -> f64 {
        if self.satisfaction_scores.is_empty() {
            return NEUTRAL;
        }
        let mean = self.satisfaction_scores.iter().sum::<f64>() / self.satisfaction_scores.len() as f64;
        ((mean - 1.0) / 4.0).clamp(0.0, 1.0)
    }

    /// 1 for instant answers, 0 at or beyond the latency ceiling.
    pub fn normalized_latency(&self, ceiling_ms: f64) -> f64 {
        if self.total_uses == 0 || ceiling_ms <= 0.0 {
            return NEUTRAL;
        }
        1.0 - (self.average_response_time_ms / ceiling_ms).clamp(0.0, 1.0)
    }

    /// Success share over the recent-outcome ring.
    pub fn recent_success_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return NEUTRAL;
        }
        self.recent_outcomes.iter().filter(|ok| **ok).count() as f64 / self.recent_outcomes.len() as f64
    }

    /// `0.4·success + 0.3·satisfaction + 0.2·latency + 0.1·confidence` with
    /// the configured weights.
    pub fn performance_score(&self, settings: &MetricsSettings) -> f64 {
        let w = &settings.weights;
        w.success * self.success_rate()
            + w.satisfaction * self.normalized_satisfaction()
            + w.latency * self.normalized_latency(settings.latency_ceiling_ms)
            + w.confidence * self.average_confidence
    }
}

/// A decision prompt: a base prompt (`base_prompt_id == None`) or one of
/// its variants. Variants are deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVariant {
    pub variant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_prompt_id: Option<String>,
    pub task_type: String,
    pub template: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub metrics: PromptPerformanceMetrics,
    /// Metrics per context signature
    #[serde(default)]
    pub context_metrics: HashMap<String, PromptPerformanceMetrics>,
    /// Registration order, used to break ties
    pub order: u64,
}

impl PromptVariant {
    pub fn is_base(&self) -> bool {
        self.base_prompt_id.is_none()
    }

    /// The base this prompt belongs to (itself for a base prompt).
    pub fn family(&self) -> &str {
        self.base_prompt_id.as_deref().unwrap_or(&self.variant_id)
    }

    /// Score within `signature`, falling back to the overall score.
    pub fn context_score(&self, signature: &str, settings: &MetricsSettings) -> f64 {
        match self.context_metrics.get(signature) {
            Some(m) if m.total_uses > 0 => m.performance_score(settings),
            _ => self.metrics.performance_score(settings),
        }
    }
}

/// An A/B test over a base prompt and its active variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub base_prompt_id: String,
    /// Arms in registration order
    pub arms: Vec<String>,
    pub allocations: HashMap<String, u64>,
    pub started_at: DateTime<Utc>,
    pub window_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluded_at: Option<DateTime<Utc>>,
}

impl Experiment {
    pub fn is_running(&self) -> bool {
        self.concluded_at.is_none()
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at >= Duration::seconds(self.window_secs)
    }
}

/// Which prompt to use for a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptChoice {
    pub prompt_id: String,
    pub template: String,
    pub score: f64,
    /// Chosen by an experiment allocation rather than scoring
    pub allocated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSummary {
    pub prompt_id: String,
    pub task_type: String,
    pub score: f64,
    pub uses: u64,
    pub is_active: bool,
}

/// A prompt whose performance varies strongly by context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecializationCandidate {
    pub prompt_id: String,
    pub best_signature: String,
    pub best_score: f64,
    pub worst_signature: String,
    pub worst_score: f64,
}

/// The optimization recommendations report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Average score × active/total ratio
    pub health_score: f64,
    pub total_prompts: usize,
    pub active_prompts: usize,
    pub prompts: Vec<PromptSummary>,
    pub underperformers: Vec<PromptSummary>,
    pub specialization_candidates: Vec<SpecializationCandidate>,
    /// Task types with fewer than two active prompts
    pub coverage_gaps: Vec<String>,
}

/// Serializable optimizer state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerSnapshot {
    pub prompts: Vec<PromptVariant>,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}
