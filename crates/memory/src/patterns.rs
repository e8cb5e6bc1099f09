//! Usage and error pattern mining over the execution log.
//!
//! Patterns are derived values: they are recomputed from the immutable log
//! and only ever cached, never persisted.

use crate::keywords::{jaccard, shared_keywords, top_keywords};
use chrono::{DateTime, Duration, Utc};
use inkwell_core::ToolExecution;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Keywords must appear in this share of contexts to become indicators.
const INDICATOR_SHARE: f32 = 0.3;

/// Signature size used for context clustering.
const SIGNATURE_SIZE: usize = 5;

/// Jaccard similarity needed to join a context cluster.
const CLUSTER_JOIN_SIMILARITY: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Capabilities used in the same order within one session
    Sequence,
    /// A capability used often
    Frequency,
    /// A capability preferred for a recurring kind of request
    Context,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Frequency => "frequency",
            Self::Context => "context",
        }
    }
}

/// A recurring way the user works with capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsagePattern {
    pub pattern_type: PatternType,
    pub capability_list: Vec<String>,
    /// Always at least 2
    pub frequency: usize,
    pub success_rate: f32,
    pub avg_execution_time_ms: f64,
    pub confidence: f32,
    pub context_indicators: BTreeSet<String>,
    pub last_seen: DateTime<Utc>,
}

impl UsagePattern {
    /// Cache key; the same pattern found twice maps to the same entry.
    pub fn key(&self) -> String {
        format!("{}:{}", self.pattern_type.as_str(), self.capability_list.join(">"))
    }

    /// One-line description for prompt context.
    pub fn summary(&self) -> String {
        let caps = match self.pattern_type {
            PatternType::Sequence => self.capability_list.join(" -> "),
            _ => self.capability_list.join(", "),
        };
        format!(
            "{} pattern: {} (seen {}x, {:.0}% success)",
            self.pattern_type.as_str(),
            caps,
            self.frequency,
            self.success_rate * 100.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    Validation,
    NotFound,
    Permission,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Categorize an error message by substring.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if has(&["timeout", "timed out"]) {
            Self::Timeout
        } else if has(&["not found", "does not exist", "unknown capability"]) {
            Self::NotFound
        } else if has(&["permission", "denied", "unauthorized", "forbidden"]) {
            Self::Permission
        } else if has(&["validation", "invalid", "missing required", "argument"]) {
            Self::Validation
        } else if has(&["network", "connection", "unreachable", "dns"]) {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    pub fn suggested_fix(&self) -> &'static str {
        match self {
            Self::Timeout => "Narrow the request or raise the capability timeout",
            Self::Validation => "Check argument names and types against the capability schema",
            Self::NotFound => "Register the capability or correct its name",
            Self::Permission => "Check credentials and access rights for the capability",
            Self::Network => "Check connectivity and retry later",
            Self::Unknown => "Inspect the sample error messages for a common cause",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// More than 10 occurrences is high, more than 5 medium.
    pub fn from_frequency(frequency: usize) -> Self {
        if frequency > 10 {
            Self::High
        } else if frequency > 5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A recurring failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub error_type: ErrorCategory,
    pub capabilities_involved: Vec<String>,
    /// Always at least 2
    pub frequency: usize,
    pub typical_context: String,
    /// At most 5
    pub sample_error_messages: Vec<String>,
    pub suggested_fix: String,
    pub severity: Severity,
    pub last_occurrence: DateTime<Utc>,
}

impl ErrorPattern {
    pub fn summary(&self) -> String {
        format!(
            "recurring {} errors in {} ({}x, {:?} severity): {}",
            self.error_type.as_str(),
            self.capabilities_involved.join(", "),
            self.frequency,
            self.severity,
            self.suggested_fix
        )
    }
}

/// Tunables for usage pattern ranking.
#[derive(Debug, Clone)]
pub struct PatternSettings {
    pub session_gap: Duration,
    pub min_confidence: f32,
    pub confidence_weight: f32,
    pub frequency_weight: f32,
    pub max_patterns: usize,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            session_gap: Duration::minutes(30),
            min_confidence: 0.2,
            confidence_weight: 0.7,
            frequency_weight: 0.3,
            max_patterns: 20,
        }
    }
}

fn context_text(exec: &ToolExecution) -> String {
    let mut text = exec.reasoning_context.clone();
    for value in exec.input_params.values() {
        if let Some(s) = value.as_str() {
            text.push(' ');
            text.push_str(s);
        }
    }
    text
}

fn success_rate<'a>(execs: impl IntoIterator<Item = &'a ToolExecution>) -> (f32, usize) {
    let (ok, total) = execs
        .into_iter()
        .fold((0usize, 0usize), |(ok, total), e| (ok + e.success as usize, total + 1));
    if total == 0 { (0.0, 0) } else { (ok as f32 / total as f32, total) }
}

fn latest<'a>(execs: impl IntoIterator<Item = &'a ToolExecution>) -> DateTime<Utc> {
    execs
        .into_iter()
        .map(|e| e.timestamp)
        .max()
        .unwrap_or_else(Utc::now)
}

/// Split time-ordered executions into sessions separated by more than `gap`.
fn sessions<'a>(execs: &[&'a ToolExecution], gap: Duration) -> Vec<Vec<&'a ToolExecution>> {
    let mut out: Vec<Vec<&ToolExecution>> = Vec::new();
    for &exec in execs {
        let continues = out
            .last()
            .and_then(|session| session.last())
            .is_some_and(|prev| exec.timestamp - prev.timestamp <= gap);
        match out.last_mut() {
            Some(current) if continues => current.push(exec),
            _ => out.push(vec![exec]),
        }
    }
    out
}

fn sequence_patterns(execs: &[&ToolExecution], gap: Duration) -> Vec<UsagePattern> {
    let mut groups: HashMap<Vec<String>, Vec<Vec<&ToolExecution>>> = HashMap::new();
    for session in sessions(execs, gap) {
        if session.len() > 1 {
            let names = session.iter().map(|e| e.capability_name.clone()).collect();
            groups.entry(names).or_default().push(session);
        }
    }

    groups
        .into_iter()
        .filter(|(_, windows)| windows.len() >= 2)
        .map(|(names, windows)| {
            let count = windows.len();
            let all = windows.iter().flatten().copied();
            let (rate, _) = success_rate(all.clone());
            let total_time: u64 = windows
                .iter()
                .map(|w| w.iter().map(|e| e.execution_time_ms).sum::<u64>())
                .sum();
            let contexts: Vec<String> = all.clone().map(context_text).collect();
            UsagePattern {
                pattern_type: PatternType::Sequence,
                capability_list: names,
                frequency: count,
                success_rate: rate,
                avg_execution_time_ms: total_time as f64 / count as f64,
                confidence: (count as f32 / 10.0).min(1.0),
                context_indicators: shared_keywords(contexts.iter().map(String::as_str), INDICATOR_SHARE),
                last_seen: latest(all),
            }
        })
        .collect()
}

fn frequency_patterns(execs: &[&ToolExecution]) -> Vec<UsagePattern> {
    let mut by_name: HashMap<&str, Vec<&ToolExecution>> = HashMap::new();
    for &exec in execs {
        by_name.entry(exec.capability_name.as_str()).or_default().push(exec);
    }

    by_name
        .into_iter()
        .filter(|(_, uses)| uses.len() >= 3)
        .map(|(name, uses)| {
            let count = uses.len();
            let (rate, _) = success_rate(uses.iter().copied());
            let total_time: u64 = uses.iter().map(|e| e.execution_time_ms).sum();
            let contexts: Vec<String> = uses.iter().map(|e| context_text(e)).collect();
            UsagePattern {
                pattern_type: PatternType::Frequency,
                capability_list: vec![name.to_string()],
                frequency: count,
                success_rate: rate,
                avg_execution_time_ms: total_time as f64 / count as f64,
                confidence: (count as f32 / 20.0).min(1.0),
                context_indicators: shared_keywords(contexts.iter().map(String::as_str), INDICATOR_SHARE),
                last_seen: latest(uses.iter().copied()),
            }
        })
        .collect()
}

fn context_patterns(execs: &[&ToolExecution]) -> Vec<UsagePattern> {
    // (representative signature, members)
    let mut clusters: Vec<(BTreeSet<String>, Vec<&ToolExecution>)> = Vec::new();
    for &exec in execs {
        let signature = top_keywords(&context_text(exec), SIGNATURE_SIZE);
        if signature.is_empty() {
            continue;
        }
        match clusters
            .iter_mut()
            .find(|(rep, _)| jaccard(rep, &signature) >= CLUSTER_JOIN_SIMILARITY)
        {
            Some((_, members)) => members.push(exec),
            None => clusters.push((signature, vec![exec])),
        }
    }

    clusters
        .into_iter()
        .filter(|(_, members)| members.len() >= 3)
        .map(|(_, members)| {
            let size = members.len();
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for m in &members {
                *counts.entry(m.capability_name.as_str()).or_default() += 1;
            }
            let top = counts.values().copied().max().unwrap_or(0);
            let mut dominant: Vec<String> = counts
                .into_iter()
                .filter(|(_, n)| *n == top)
                .map(|(name, _)| name.to_string())
                .collect();
            dominant.sort();

            let (rate, _) = success_rate(members.iter().copied());
            let total_time: u64 = members.iter().map(|e| e.execution_time_ms).sum();
            let contexts: Vec<String> = members.iter().map(|e| context_text(e)).collect();
            UsagePattern {
                pattern_type: PatternType::Context,
                capability_list: dominant,
                frequency: size,
                success_rate: rate,
                avg_execution_time_ms: total_time as f64 / size as f64,
                confidence: (size as f32 / 10.0).min(1.0),
                context_indicators: shared_keywords(contexts.iter().map(String::as_str), INDICATOR_SHARE),
                last_seen: latest(members.iter().copied()),
            }
        })
        .collect()
}

/// Mine sequence, frequency and context patterns from executions newer than
/// `since`, then filter and rank them. Needs at least three executions.
pub fn detect_usage_patterns(
    executions: &[ToolExecution],
    since: DateTime<Utc>,
    settings: &PatternSettings,
) -> Vec<UsagePattern> {
    let mut recent: Vec<&ToolExecution> = executions.iter().filter(|e| e.timestamp >= since).collect();
    if recent.len() < 3 {
        return Vec::new();
    }
    recent.sort_by_key(|e| e.timestamp);

    let mut patterns = sequence_patterns(&recent, settings.session_gap);
    patterns.extend(frequency_patterns(&recent));
    patterns.extend(context_patterns(&recent));

    let rank = |p: &UsagePattern| {
        settings.confidence_weight * p.confidence
            + settings.frequency_weight * (p.frequency as f32 / 20.0)
    };
    patterns.retain(|p| p.confidence >= settings.min_confidence);
    patterns.sort_by(|a, b| {
        rank(b)
            .partial_cmp(&rank(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key().cmp(&b.key()))
    });
    patterns.truncate(settings.max_patterns);
    patterns
}

/// Group failures newer than `since` by category. Needs at least two failures.
pub fn detect_error_patterns(executions: &[ToolExecution], since: DateTime<Utc>) -> Vec<ErrorPattern> {
    let failures: Vec<&ToolExecution> = executions
        .iter()
        .filter(|e| !e.success && e.timestamp >= since)
        .collect();
    if failures.len() < 2 {
        return Vec::new();
    }

    let mut groups: HashMap<ErrorCategory, Vec<&ToolExecution>> = HashMap::new();
    for failure in failures {
        let message = failure.error_message.as_deref().unwrap_or_default();
        groups.entry(ErrorCategory::classify(message)).or_default().push(failure);
    }

    let mut patterns: Vec<ErrorPattern> = groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(category, members)| {
            let capabilities: BTreeSet<String> =
                members.iter().map(|e| e.capability_name.clone()).collect();

            let mut samples: Vec<String> = Vec::new();
            for m in &members {
                if let Some(msg) = &m.error_message {
                    if !samples.contains(msg) && samples.len() < 5 {
                        samples.push(msg.clone());
                    }
                }
            }

            let mut context_counts: HashMap<&str, usize> = HashMap::new();
            for m in &members {
                if !m.reasoning_context.is_empty() {
                    *context_counts.entry(m.reasoning_context.as_str()).or_default() += 1;
                }
            }
            let typical_context = context_counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(ctx, _)| ctx.to_string())
                .unwrap_or_default();

            ErrorPattern {
                error_type: category,
                capabilities_involved: capabilities.into_iter().collect(),
                frequency: members.len(),
                typical_context,
                sample_error_messages: samples,
                suggested_fix: category.suggested_fix().to_string(),
                severity: Severity::from_frequency(members.len()),
                last_occurrence: latest(members.iter().copied()),
            }
        })
        .collect();

    patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.error_type.cmp(&b.error_type)));
    patterns
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use inkwell_core::{CapabilityArgs, ToolExecution};

    pub fn exec_at(name: &str, at: DateTime<Utc>, context: &str, ok: bool) -> ToolExecution {
        let exec = ToolExecution::begin("u1", name, CapabilityArgs::new(), context, 0.8);
        let mut exec = if ok {
            exec.succeeded(serde_json::json!("done"), 100)
        } else {
            exec.failed("Capability x hit its timeout after 30s", 30_000)
        };
        exec.timestamp = at;
        exec
    }
}
