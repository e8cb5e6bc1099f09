//! Configuration loading, validation, and management for Inkwell.
//!
//! Loads configuration from `~/.inkwell/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.inkwell/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reasoning engine settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Action executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Memory indexer and persistence settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Prompt optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Context assembly settings
    #[serde(default)]
    pub context: ContextConfig,
}

// ── Provider ──────────────────────────────────────────────────────────────

/// OpenAI-compatible provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key; usually supplied by environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout() -> u64 {
    60
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ── Reasoning ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// LLM calls per turn before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles on every retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Prompt-response cache entries
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Characters of the rendered prompt that feed the cache key
    #[serde(default = "default_prompt_prefix_chars")]
    pub prompt_prefix_chars: usize,

    /// Characters of the user input that feed the cache key
    #[serde(default = "default_input_prefix_chars")]
    pub input_prefix_chars: usize,

    /// Selector confidence needed to override the LLM's choice
    #[serde(default = "default_selector_override_threshold")]
    pub selector_override_threshold: f32,

    /// Task type the decision prompt is registered under
    #[serde(default = "default_task_type")]
    pub task_type: String,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_cache_capacity() -> usize {
    100
}
fn default_prompt_prefix_chars() -> usize {
    500
}
fn default_input_prefix_chars() -> usize {
    200
}
fn default_selector_override_threshold() -> f32 {
    0.7
}
fn default_task_type() -> String {
    "decision".into()
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            cache_capacity: default_cache_capacity(),
            prompt_prefix_chars: default_prompt_prefix_chars(),
            input_prefix_chars: default_input_prefix_chars(),
            selector_override_threshold: default_selector_override_threshold(),
            task_type: default_task_type(),
        }
    }
}

// ── Executor ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Default timeout per capability category, in seconds
    #[serde(default)]
    pub category_timeouts: CategoryTimeouts,

    /// Per-capability timeout overrides, in seconds
    #[serde(default)]
    pub timeout_overrides: HashMap<String, u64>,

    /// Extra argument remapping rules, merged over the built-in table
    #[serde(default)]
    pub argument_rules: BTreeMap<String, ArgumentRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTimeouts {
    #[serde(default = "default_generation_timeout")]
    pub generation: u64,
    #[serde(default = "default_analysis_timeout")]
    pub analysis: u64,
    #[serde(default = "default_short_timeout")]
    pub lookup: u64,
    #[serde(default = "default_short_timeout")]
    pub utility: u64,
}

fn default_generation_timeout() -> u64 {
    60
}
fn default_analysis_timeout() -> u64 {
    45
}
fn default_short_timeout() -> u64 {
    30
}

impl Default for CategoryTimeouts {
    fn default() -> Self {
        Self {
            generation: default_generation_timeout(),
            analysis: default_analysis_timeout(),
            lookup: default_short_timeout(),
            utility: default_short_timeout(),
        }
    }
}

/// Argument remapping for one capability.
///
/// ```toml
/// [executor.argument_rules.outline]
/// renames = { subject = "topic" }
/// defaults = { sections = 5 }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentRuleConfig {
    /// Generic argument name → the capability's own name
    #[serde(default)]
    pub renames: BTreeMap<String, String>,

    /// Values injected when the argument is still absent
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,
}

// ── Memory ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Store backend: "file", "memory", or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Where the file backend keeps per-user data; defaults to `~/.inkwell/data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Gap that splits executions into separate sessions
    #[serde(default = "default_sequence_window")]
    pub sequence_window_minutes: i64,

    /// How far back pattern detection looks
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    #[serde(default = "default_pattern_cache_capacity")]
    pub pattern_cache_capacity: usize,

    /// Patterns kept after ranking
    #[serde(default = "default_max_patterns")]
    pub max_patterns: usize,

    /// Patterns below this confidence are dropped before ranking
    #[serde(default = "default_min_pattern_confidence")]
    pub min_pattern_confidence: f32,

    #[serde(default = "default_confidence_weight")]
    pub ranking_confidence_weight: f32,

    #[serde(default = "default_frequency_weight")]
    pub ranking_frequency_weight: f32,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_sequence_window() -> i64 {
    30
}
fn default_lookback_days() -> i64 {
    30
}
fn default_pattern_cache_capacity() -> usize {
    50
}
fn default_max_patterns() -> usize {
    20
}
fn default_min_pattern_confidence() -> f32 {
    0.2
}
fn default_confidence_weight() -> f32 {
    0.7
}
fn default_frequency_weight() -> f32 {
    0.3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            data_dir: None,
            sequence_window_minutes: default_sequence_window(),
            lookback_days: default_lookback_days(),
            pattern_cache_capacity: default_pattern_cache_capacity(),
            max_patterns: default_max_patterns(),
            min_pattern_confidence: default_min_pattern_confidence(),
            ranking_confidence_weight: default_confidence_weight(),
            ranking_frequency_weight: default_frequency_weight(),
        }
    }
}

impl MemoryConfig {
    /// Resolved data directory for the file backend.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("data"))
    }
}

// ── Optimizer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub score_weights: ScoreWeights,

    #[serde(default)]
    pub selection_weights: SelectionWeights,

    /// Smoothing factor for response-time and confidence averages
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,

    #[serde(default = "default_satisfaction_window")]
    pub satisfaction_window: usize,

    #[serde(default = "default_recency_window")]
    pub recency_window: usize,

    /// Response time treated as the worst case when normalizing latency
    #[serde(default = "default_latency_ceiling_ms")]
    pub latency_ceiling_ms: f64,

    #[serde(default = "default_experiment_window_hours")]
    pub experiment_window_hours: i64,

    /// Variants with at least 10 uses and a score below this are deactivated
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: f64,

    /// Run maintenance every N interactions
    #[serde(default = "default_optimize_every")]
    pub optimize_every: u64,

    /// Task types that should each have at least two active prompts
    #[serde(default = "default_expected_task_types")]
    pub expected_task_types: Vec<String>,
}

fn default_ema_alpha() -> f64 {
    0.1
}
fn default_satisfaction_window() -> usize {
    50
}
fn default_recency_window() -> usize {
    20
}
fn default_latency_ceiling_ms() -> f64 {
    10_000.0
}
fn default_experiment_window_hours() -> i64 {
    24
}
fn default_archive_threshold() -> f64 {
    0.3
}
fn default_optimize_every() -> u64 {
    5
}
fn default_expected_task_types() -> Vec<String> {
    vec![default_task_type()]
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            score_weights: ScoreWeights::default(),
            selection_weights: SelectionWeights::default(),
            ema_alpha: default_ema_alpha(),
            satisfaction_window: default_satisfaction_window(),
            recency_window: default_recency_window(),
            latency_ceiling_ms: default_latency_ceiling_ms(),
            experiment_window_hours: default_experiment_window_hours(),
            archive_threshold: default_archive_threshold(),
            optimize_every: default_optimize_every(),
            expected_task_types: default_expected_task_types(),
        }
    }
}

/// Weights of the per-prompt performance score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub success: f64,
    pub satisfaction: f64,
    pub latency: f64,
    pub confidence: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            success: 0.4,
            satisfaction: 0.3,
            latency: 0.2,
            confidence: 0.1,
        }
    }
}

/// Weights of the prompt selection score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionWeights {
    pub performance: f64,
    pub context: f64,
    pub affinity: f64,
    pub recency: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            performance: 0.5,
            context: 0.3,
            affinity: 0.1,
            recency: 0.1,
        }
    }
}

// ── Context ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Upper bound on assembled context tokens
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Recent conversation turns considered
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_token_budget() -> usize {
    2000
}
fn default_history_turns() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            history_turns: default_history_turns(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.inkwell/config.toml).
    ///
    /// Also checks environment variables:
    /// - `INKWELL_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `INKWELL_MODEL`
    /// - `INKWELL_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = std::env::var("INKWELL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("INKWELL_MODEL") {
            self.provider.model = model;
        }
        if let Ok(url) = std::env::var("INKWELL_API_URL") {
            self.provider.api_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".inkwell")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.reasoning.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "reasoning.max_attempts must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reasoning.selector_override_threshold) {
            return Err(ConfigError::ValidationError(
                "reasoning.selector_override_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "file" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be one of file, memory, none (got '{}')",
                self.memory.backend
            )));
        }

        if self.memory.sequence_window_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "memory.sequence_window_minutes must be > 0".into(),
            ));
        }

        if self.memory.ranking_confidence_weight + self.memory.ranking_frequency_weight <= 0.0 {
            return Err(ConfigError::ValidationError(
                "ranking_confidence_weight + ranking_frequency_weight must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.optimizer.ema_alpha) || self.optimizer.ema_alpha == 0.0 {
            return Err(ConfigError::ValidationError(
                "optimizer.ema_alpha must be in (0.0, 1.0]".into(),
            ));
        }

        if self.optimizer.satisfaction_window == 0 || self.optimizer.recency_window == 0 {
            return Err(ConfigError::ValidationError(
                "optimizer windows must be at least 1".into(),
            ));
        }

        if self.context.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.token_budget must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
