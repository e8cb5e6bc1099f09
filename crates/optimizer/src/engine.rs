//! Thread-safe prompt optimizer: tracks prompt performance, selects the
//! best prompt for a context, runs A/B experiments and archives variants
//! that keep underperforming.

use crate::OptimizerError;
use crate::model::*;
use crate::signature::ContextSignals;
use chrono::{DateTime, Duration, Utc};
use inkwell_config::OptimizerConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Minimum uses before a variant can be archived.
const ARCHIVE_MIN_USES: u64 = 10;
/// Minimum uses before a variant can be declared winner.
const WINNER_MIN_USES: u64 = 5;
/// Margin a variant must beat its base by to win.
const WINNER_MARGIN: f64 = 0.05;
/// Report thresholds.
const UNDERPERFORMER_MIN_USES: u64 = 5;
const UNDERPERFORMER_SCORE: f64 = 0.6;
const SPECIALIZATION_SPREAD: f64 = 0.3;
const MIN_ACTIVE_PER_TASK: usize = 2;

/// The prompt optimizer.
///
/// Thread-safe via `RwLock`; shared between the reasoning engine, which
/// selects prompts and reports outcomes, and the orchestrator, which feeds
/// satisfaction and runs maintenance.
pub struct PromptOptimizer {
    config: OptimizerConfig,
    settings: MetricsSettings,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    prompts: HashMap<String, PromptVariant>,
    experiments: HashMap<String, Experiment>,
    next_order: u64,
}

impl State {
    /// Active prompts of one family in registration order.
    fn family(&self, base_prompt_id: &str) -> Vec<&PromptVariant> {
        let mut members: Vec<&PromptVariant> = self
            .prompts
            .values()
            .filter(|p| p.is_active && p.family() == base_prompt_id)
            .collect();
        members.sort_by_key(|p| p.order);
        members
    }
}

impl PromptOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            settings: MetricsSettings::from(&config),
            config,
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    // ── Registration ──────────────────────────────────────────────

    /// Register a base prompt. Re-registering keeps existing metrics and
    /// replaces the template.
    pub fn register_base(&self, prompt_id: &str, task_type: &str, template: &str) {
        let mut state = self.write();
        if let Some(existing) = state.prompts.get_mut(prompt_id) {
            existing.template = template.to_string();
            existing.task_type = task_type.to_string();
            return;
        }
        let order = state.next_order;
        state.next_order += 1;
        state.prompts.insert(
            prompt_id.to_string(),
            PromptVariant {
                variant_id: prompt_id.to_string(),
                base_prompt_id: None,
                task_type: task_type.to_string(),
                template: template.to_string(),
                description: "base prompt".into(),
                is_active: true,
                metrics: PromptPerformanceMetrics::new(prompt_id),
                context_metrics: HashMap::new(),
                order,
            },
        );
        debug!(prompt_id, task_type, "Base prompt registered");
    }

    /// Register a variant of an existing base prompt. Returns its id.
    ///
    /// A variant with the same template as an existing family member is not
    /// duplicated; the existing id is returned instead.
    pub fn register_variant(
        &self,
        base_prompt_id: &str,
        template: &str,
        description: &str,
    ) -> Result<String, OptimizerError> {
        let mut state = self.write();
        let base = state
            .prompts
            .get(base_prompt_id)
            .filter(|p| p.is_base())
            .ok_or_else(|| OptimizerError::UnknownPrompt(base_prompt_id.to_string()))?;
        let task_type = base.task_type.clone();

        if let Some(existing) = state
            .prompts
            .values()
            .find(|p| p.base_prompt_id.as_deref() == Some(base_prompt_id) && p.template == template)
        {
            return Ok(existing.variant_id.clone());
        }

        let siblings = state
            .prompts
            .values()
            .filter(|p| p.base_prompt_id.as_deref() == Some(base_prompt_id))
            .count();
        let variant_id = format!("{base_prompt_id}-v{}", siblings + 1);
        let order = state.next_order;
        state.next_order += 1;
        state.prompts.insert(
            variant_id.clone(),
            PromptVariant {
                variant_id: variant_id.clone(),
                base_prompt_id: Some(base_prompt_id.to_string()),
                task_type,
                template: template.to_string(),
                description: description.to_string(),
                is_active: true,
                metrics: PromptPerformanceMetrics::new(&variant_id),
                context_metrics: HashMap::new(),
                order,
            },
        );
        info!(variant_id = %variant_id, base = base_prompt_id, "Prompt variant registered");
        Ok(variant_id)
    }

    pub fn prompt(&self, prompt_id: &str) -> Option<PromptVariant> {
        self.read().prompts.get(prompt_id).cloned()
    }

    /// All prompts in registration order.
    pub fn prompts(&self) -> Vec<PromptVariant> {
        let state = self.read();
        let mut all: Vec<PromptVariant> = state.prompts.values().cloned().collect();
        all.sort_by_key(|p| p.order);
        all
    }

    /// Active members of a family: the base and its active variants.
    pub fn candidates(&self, base_prompt_id: &str) -> Vec<String> {
        self.read()
            .family(base_prompt_id)
            .into_iter()
            .map(|p| p.variant_id.clone())
            .collect()
    }

    // ── Outcomes ──────────────────────────────────────────────────

    /// Record one use of a prompt, overall and under `signature`.
    pub fn record_use(
        &self,
        prompt_id: &str,
        signature: &str,
        outcome: &Outcome,
    ) -> Result<(), OptimizerError> {
        let mut state = self.write();
        let prompt = state
            .prompts
            .get_mut(prompt_id)
            .ok_or_else(|| OptimizerError::UnknownPrompt(prompt_id.to_string()))?;
        prompt.metrics.record(outcome, &self.settings);
        prompt
            .context_metrics
            .entry(signature.to_string())
            .or_insert_with(|| PromptPerformanceMetrics::new(prompt_id))
            .record(outcome, &self.settings);
        Ok(())
    }

    /// Attach a 1–5 satisfaction score to a prompt.
    pub fn record_satisfaction(
        &self,
        prompt_id: &str,
        signature: Option<&str>,
        score: f64,
    ) -> Result<(), OptimizerError> {
        let mut state = self.write();
        let prompt = state
            .prompts
            .get_mut(prompt_id)
            .ok_or_else(|| OptimizerError::UnknownPrompt(prompt_id.to_string()))?;
        prompt.metrics.add_satisfaction(score, &self.settings);
        if let Some(m) = signature.and_then(|sig| prompt.context_metrics.get_mut(sig)) {
            m.add_satisfaction(score, &self.settings);
        }
        Ok(())
    }

    // ── Selection ─────────────────────────────────────────────────

    /// Pick the best candidate for a task in a context.
    ///
    /// `score = 0.5·performance + 0.3·context + 0.1·task affinity + 0.1·recency`
    /// with the configured weights. Ties go to the earlier registration.
    pub fn select(
        &self,
        task_type: &str,
        signals: &ContextSignals,
        candidates: &[String],
    ) -> Option<PromptChoice> {
        let state = self.read();
        let signature = signals.signature();
        let w = &self.config.selection_weights;

        let mut best: Option<(&PromptVariant, f64)> = None;
        for id in candidates {
            let Some(prompt) = state.prompts.get(id).filter(|p| p.is_active) else {
                continue;
            };
            let score = w.performance * prompt.metrics.performance_score(&self.settings)
                + w.context * prompt.context_score(&signature, &self.settings)
                + w.affinity * task_affinity(&prompt.task_type, task_type)
                + w.recency * prompt.metrics.recent_success_rate();
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    score > current_score || (score == current_score && prompt.order < current.order)
                }
            };
            if better {
                best = Some((prompt, score));
            }
        }

        best.map(|(prompt, score)| PromptChoice {
            prompt_id: prompt.variant_id.clone(),
            template: prompt.template.clone(),
            score,
            allocated: false,
        })
    }

    /// Choose a prompt for a family: an experiment allocation while one is
    /// running, otherwise the best-scoring active member.
    pub fn choose(
        &self,
        base_prompt_id: &str,
        task_type: &str,
        signals: &ContextSignals,
    ) -> Option<PromptChoice> {
        self.choose_at(base_prompt_id, task_type, signals, Utc::now())
    }

    pub fn choose_at(
        &self,
        base_prompt_id: &str,
        task_type: &str,
        signals: &ContextSignals,
        now: DateTime<Utc>,
    ) -> Option<PromptChoice> {
        if let Some(arm) = self.allocate_at(base_prompt_id, now) {
            let state = self.read();
            if let Some(prompt) = state.prompts.get(&arm) {
                return Some(PromptChoice {
                    prompt_id: arm,
                    template: prompt.template.clone(),
                    score: prompt.metrics.performance_score(&self.settings),
                    allocated: true,
                });
            }
        }
        let candidates = self.candidates(base_prompt_id);
        self.select(task_type, signals, &candidates)
    }

    // ── Experiments ───────────────────────────────────────────────

    /// Start an A/B test over the base and its active variants.
    pub fn start_experiment(&self, base_prompt_id: &str, window: Duration) -> Result<(), OptimizerError> {
        self.start_experiment_at(base_prompt_id, window, Utc::now())
    }

    pub fn start_experiment_at(
        &self,
        base_prompt_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), OptimizerError> {
        let mut state = self.write();
        if !state.prompts.get(base_prompt_id).is_some_and(|p| p.is_base()) {
            return Err(OptimizerError::UnknownPrompt(base_prompt_id.to_string()));
        }
        if state.experiments.get(base_prompt_id).is_some_and(|e| e.is_running()) {
            return Err(OptimizerError::ExperimentRunning(base_prompt_id.to_string()));
        }
        let arms: Vec<String> = state
            .family(base_prompt_id)
            .into_iter()
            .map(|p| p.variant_id.clone())
            .collect();
        if arms.len() < 2 {
            return Err(OptimizerError::NotEnoughArms {
                base: base_prompt_id.to_string(),
                arms: arms.len(),
            });
        }

        info!(base = base_prompt_id, arms = arms.len(), window_hours = window.num_hours(), "Experiment started");
        state.experiments.insert(
            base_prompt_id.to_string(),
            Experiment {
                base_prompt_id: base_prompt_id.to_string(),
                allocations: arms.iter().map(|a| (a.clone(), 0)).collect(),
                arms,
                started_at: now,
                window_secs: window.num_seconds(),
                winner: None,
                concluded_at: None,
            },
        );
        Ok(())
    }

    /// Next arm of a running experiment: the least-served arm, ties going to
    /// registration order. Concludes the experiment and returns `None` once
    /// its window has elapsed.
    pub fn allocate(&self, base_prompt_id: &str) -> Option<String> {
        self.allocate_at(base_prompt_id, Utc::now())
    }

    pub fn allocate_at(&self, base_prompt_id: &str, now: DateTime<Utc>) -> Option<String> {
        let mut state = self.write();
        let expired = {
            let experiment = state.experiments.get(base_prompt_id).filter(|e| e.is_running())?;
            experiment.has_expired(now)
        };
        if expired {
            conclude(&mut state, base_prompt_id, now);
            return None;
        }

        let State { prompts, experiments, .. } = &mut *state;
        let experiment = experiments.get_mut(base_prompt_id)?;
        let arm = experiment
            .arms
            .iter()
            .filter(|a| prompts.get(*a).is_some_and(|p| p.is_active))
            .min_by_key(|a| experiment.allocations.get(*a).copied().unwrap_or(0))?
            .clone();
        *experiment.allocations.entry(arm.clone()).or_insert(0) += 1;
        Some(arm)
    }

    /// Conclude every running experiment whose window has elapsed.
    pub fn conclude_expired(&self, now: DateTime<Utc>) -> Vec<Experiment> {
        let mut state = self.write();
        let due: Vec<String> = state
            .experiments
            .values()
            .filter(|e| e.is_running() && e.has_expired(now))
            .map(|e| e.base_prompt_id.clone())
            .collect();
        due.iter().filter_map(|base| conclude(&mut state, base, now)).collect()
    }

    pub fn experiment(&self, base_prompt_id: &str) -> Option<Experiment> {
        self.read().experiments.get(base_prompt_id).cloned()
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Deactivate variants with at least ten uses scoring under `threshold`.
    /// Base prompts are never archived. Returns the archived ids.
    pub fn archive_underperforming(&self, threshold: f64) -> Vec<String> {
        let mut state = self.write();
        let mut archived = Vec::new();
        for prompt in state.prompts.values_mut() {
            if prompt.is_base() || !prompt.is_active || prompt.metrics.total_uses < ARCHIVE_MIN_USES {
                continue;
            }
            let score = prompt.metrics.performance_score(&self.settings);
            if score < threshold {
                prompt.is_active = false;
                info!(variant_id = %prompt.variant_id, score, "Prompt variant archived");
                archived.push(prompt.variant_id.clone());
            }
        }
        archived.sort();
        archived
    }

    /// A variant that clearly beats its base: at least five uses and a
    /// score of base + 0.05 or more.
    pub fn get_winner(&self, base_prompt_id: &str) -> Option<String> {
        let state = self.read();
        let base_score = state
            .prompts
            .get(base_prompt_id)?
            .metrics
            .performance_score(&self.settings);

        state
            .family(base_prompt_id)
            .into_iter()
            .filter(|p| !p.is_base() && p.metrics.total_uses >= WINNER_MIN_USES)
            .map(|p| (p, p.metrics.performance_score(&self.settings)))
            .filter(|(_, score)| *score >= base_score + WINNER_MARGIN)
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.order.cmp(&a.0.order)))
            .map(|(p, _)| p.variant_id.clone())
    }

    // ── Reporting ─────────────────────────────────────────────────

    pub fn recommendations(&self) -> OptimizationReport {
        let state = self.read();
        let mut prompts: Vec<&PromptVariant> = state.prompts.values().collect();
        prompts.sort_by_key(|p| p.order);

        let summaries: Vec<PromptSummary> = prompts
            .iter()
            .map(|p| PromptSummary {
                prompt_id: p.variant_id.clone(),
                task_type: p.task_type.clone(),
                score: p.metrics.performance_score(&self.settings),
                uses: p.metrics.total_uses,
                is_active: p.is_active,
            })
            .collect();

        let total = summaries.len();
        let active = summaries.iter().filter(|s| s.is_active).count();
        let health_score = if total == 0 {
            0.0
        } else {
            let avg = summaries.iter().map(|s| s.score).sum::<f64>() / total as f64;
            avg * active as f64 / total as f64
        };

        let underperformers = summaries
            .iter()
            .filter(|s| s.is_active && s.uses >= UNDERPERFORMER_MIN_USES && s.score < UNDERPERFORMER_SCORE)
            .cloned()
            .collect();

        let specialization_candidates = prompts
            .iter()
            .filter_map(|p| self.specialization(p))
            .collect();

        let mut active_per_task: BTreeMap<String, usize> = self
            .config
            .expected_task_types
            .iter()
            .map(|t| (t.clone(), 0))
            .collect();
        for p in prompts.iter().filter(|p| p.is_active) {
            *active_per_task.entry(p.task_type.clone()).or_insert(0) += 1;
        }
        let coverage_gaps = active_per_task
            .into_iter()
            .filter(|(_, n)| *n < MIN_ACTIVE_PER_TASK)
            .map(|(task, _)| task)
            .collect();

        OptimizationReport {
            health_score,
            total_prompts: total,
            active_prompts: active,
            prompts: summaries,
            underperformers,
            specialization_candidates,
            coverage_gaps,
        }
    }

    fn specialization(&self, prompt: &PromptVariant) -> Option<SpecializationCandidate> {
        let mut scored: Vec<(&String, f64)> = prompt
            .context_metrics
            .iter()
            .filter(|(_, m)| m.total_uses > 0)
            .map(|(sig, m)| (sig, m.performance_score(&self.settings)))
            .collect();
        if scored.len() < 2 {
            return None;
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
        let (best_sig, best) = scored.first()?;
        let (worst_sig, worst) = scored.last()?;
        (best - worst > SPECIALIZATION_SPREAD).then(|| SpecializationCandidate {
            prompt_id: prompt.variant_id.clone(),
            best_signature: (*best_sig).clone(),
            best_score: *best,
            worst_signature: (*worst_sig).clone(),
            worst_score: *worst,
        })
    }

    // ── Persistence ───────────────────────────────────────────────

    pub fn snapshot(&self) -> OptimizerSnapshot {
        let state = self.read();
        let mut prompts: Vec<PromptVariant> = state.prompts.values().cloned().collect();
        prompts.sort_by_key(|p| p.order);
        let mut experiments: Vec<Experiment> = state.experiments.values().cloned().collect();
        experiments.sort_by(|a, b| a.base_prompt_id.cmp(&b.base_prompt_id));
        OptimizerSnapshot { prompts, experiments }
    }

    /// Replace all state with a snapshot.
    pub fn restore(&self, snapshot: OptimizerSnapshot) {
        let mut state = self.write();
        state.next_order = snapshot.prompts.iter().map(|p| p.order + 1).max().unwrap_or(0);
        state.prompts = snapshot
            .prompts
            .into_iter()
            .map(|p| (p.variant_id.clone(), p))
            .collect();
        state.experiments = snapshot
            .experiments
            .into_iter()
            .map(|e| (e.base_prompt_id.clone(), e))
            .collect();
        debug!(prompts = state.prompts.len(), "Optimizer state restored");
    }
}

/// 1 for the same task type, 0.5 when one contains the other, else 0.
fn task_affinity(prompt_task: &str, wanted: &str) -> f64 {
    if prompt_task == wanted {
        1.0
    } else if prompt_task.contains(wanted) || wanted.contains(prompt_task) {
        0.5
    } else {
        0.0
    }
}

/// Close an experiment, picking the arm with the best success rate
/// (ties to registration order).
fn conclude(state: &mut State, base_prompt_id: &str, now: DateTime<Utc>) -> Option<Experiment> {
    let State { prompts, experiments, .. } = state;
    let experiment = experiments.get_mut(base_prompt_id)?;

    let mut winner: Option<(&String, f64)> = None;
    for arm in &experiment.arms {
        let Some(prompt) = prompts.get(arm) else { continue };
        let rate = prompt.metrics.success_rate();
        if winner.is_none_or(|(_, best)| rate > best) {
            winner = Some((arm, rate));
        }
    }
    let winner = winner.map(|(arm, _)| arm.clone());

    info!(base = base_prompt_id, winner = ?winner, "Experiment concluded");
    experiment.winner = winner;
    experiment.concluded_at = Some(now);
    Some(experiment.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer() -> PromptOptimizer {
        let opt = PromptOptimizer::new(OptimizerConfig::default());
        opt.register_base("decision", "decision", "base template {user_input}");
        opt
    }

    fn record_n(opt: &PromptOptimizer, id: &str, successes: usize, failures: usize) {
        for _ in 0..successes {
            opt.record_use(id, "errors=false|length=short", &Outcome::success(800.0, 0.8)).unwrap();
        }
        for _ in 0..failures {
            opt.record_use(id, "errors=false|length=short", &Outcome::failure(800.0)).unwrap();
        }
    }

    #[test]
    fn variant_ids_are_sequential_and_deduplicated() {
        let opt = optimizer();
        let a = opt.register_variant("decision", "concise {user_input}", "concise").unwrap();
        let b = opt.register_variant("decision", "warm {user_input}", "warm").unwrap();
        let again = opt.register_variant("decision", "concise {user_input}", "dup").unwrap();
        assert_eq!(a, "decision-v1");
        assert_eq!(b, "decision-v2");
        assert_eq!(again, a);
        assert_eq!(opt.candidates("decision"), vec!["decision", "decision-v1", "decision-v2"]);
    }

    #[test]
    fn variant_of_unknown_base_is_rejected() {
        let opt = optimizer();
        assert!(matches!(
            opt.register_variant("nope", "t", "d"),
            Err(OptimizerError::UnknownPrompt(_))
        ));
    }

    #[test]
    fn select_prefers_better_performer() {
        let opt = optimizer();
        let v = opt.register_variant("decision", "variant", "v").unwrap();
        record_n(&opt, "decision", 2, 8);
        record_n(&opt, &v, 9, 1);
        let choice = opt
            .select("decision", &ContextSignals::default(), &opt.candidates("decision"))
            .unwrap();
        assert_eq!(choice.prompt_id, v);
        assert!(!choice.allocated);
    }

    #[test]
    fn select_ties_go_to_registration_order() {
        let opt = optimizer();
        opt.register_variant("decision", "variant", "v").unwrap();
        let choice = opt
            .select("decision", &ContextSignals::default(), &opt.candidates("decision"))
            .unwrap();
        assert_eq!(choice.prompt_id, "decision");
    }

    #[test]
    fn experiment_allocates_least_served_then_concludes() {
        let opt = optimizer();
        let v = opt.register_variant("decision", "variant", "v").unwrap();
        let start = Utc::now();
        opt.start_experiment_at("decision", Duration::hours(24), start).unwrap();

        assert_eq!(opt.allocate_at("decision", start).as_deref(), Some("decision"));
        assert_eq!(opt.allocate_at("decision", start).as_deref(), Some(v.as_str()));
        assert_eq!(opt.allocate_at("decision", start).as_deref(), Some("decision"));

        record_n(&opt, "decision", 1, 3);
        record_n(&opt, &v, 4, 0);

        let later = start + Duration::hours(25);
        assert_eq!(opt.allocate_at("decision", later), None);
        let experiment = opt.experiment("decision").unwrap();
        assert!(!experiment.is_running());
        assert_eq!(experiment.winner.as_deref(), Some(v.as_str()));
    }

    #[test]
    fn experiment_needs_two_arms() {
        let opt = optimizer();
        assert!(matches!(
            opt.start_experiment("decision", Duration::hours(1)),
            Err(OptimizerError::NotEnoughArms { arms: 1, .. })
        ));
    }

    #[test]
    fn second_experiment_is_rejected_while_running() {
        let opt = optimizer();
        opt.register_variant("decision", "variant", "v").unwrap();
        opt.start_experiment("decision", Duration::hours(1)).unwrap();
        assert!(matches!(
            opt.start_experiment("decision", Duration::hours(1)),
            Err(OptimizerError::ExperimentRunning(_))
        ));
    }

    #[test]
    fn archive_requires_ten_uses_and_spares_base() {
        let opt = optimizer();
        let v = opt.register_variant("decision", "variant", "v").unwrap();
        record_n(&opt, &v, 0, 9);
        record_n(&opt, "decision", 0, 20);
        assert!(opt.archive_underperforming(0.4).is_empty());

        record_n(&opt, &v, 0, 1);
        assert_eq!(opt.archive_underperforming(0.4), vec![v.clone()]);
        assert!(!opt.prompt(&v).unwrap().is_active);
        assert!(opt.prompt("decision").unwrap().is_active);
        assert_eq!(opt.candidates("decision"), vec!["decision"]);
    }

    #[test]
    fn winner_needs_margin_and_uses() {
        let opt = optimizer();
        let v = opt.register_variant("decision", "variant", "v").unwrap();
        record_n(&opt, "decision", 2, 3);
        record_n(&opt, &v, 4, 0);
        assert_eq!(opt.get_winner("decision"), None);
        record_n(&opt, &v, 1, 0);
        assert_eq!(opt.get_winner("decision"), Some(v));
    }

    #[test]
    fn report_flags_gaps_and_underperformers() {
        let opt = optimizer();
        let report = opt.recommendations();
        assert_eq!(report.coverage_gaps, vec!["decision"]);
        assert_eq!(report.total_prompts, 1);

        record_n(&opt, "decision", 0, 6);
        let report = opt.recommendations();
        assert_eq!(report.underperformers.len(), 1);
        assert!(report.health_score < 0.6);
    }

    #[test]
    fn report_finds_specialization() {
        let opt = optimizer();
        for _ in 0..5 {
            opt.record_use("decision", "mood=happy", &Outcome::success(100.0, 0.9)).unwrap();
            opt.record_use("decision", "mood=frustrated", &Outcome::failure(9000.0)).unwrap();
        }
        let report = opt.recommendations();
        let candidate = &report.specialization_candidates[0];
        assert_eq!(candidate.best_signature, "mood=happy");
        assert_eq!(candidate.worst_signature, "mood=frustrated");
    }

    #[test]
    fn snapshot_restores_metrics() {
        let opt = optimizer();
        let v = opt.register_variant("decision", "variant", "v").unwrap();
        record_n(&opt, &v, 3, 1);
        opt.record_satisfaction(&v, None, 5.0).unwrap();

        let json = serde_json::to_value(opt.snapshot()).unwrap();
        let restored = PromptOptimizer::new(OptimizerConfig::default());
        restored.restore(serde_json::from_value(json).unwrap());

        let prompt = restored.prompt(&v).unwrap();
        assert_eq!(prompt.metrics.total_uses, 4);
        assert_eq!(prompt.metrics.satisfaction_scores.len(), 1);
        // re-registering the base keeps its metrics
        restored.register_base("decision", "decision", "new template");
        assert_eq!(restored.prompt("decision").unwrap().template, "new template");
        assert_eq!(restored.register_variant("decision", "other", "o").unwrap(), "decision-v2");
    }

    #[test]
    fn unknown_prompt_outcome_is_an_error() {
        let opt = optimizer();
        assert!(opt.record_use("ghost", "", &Outcome::failure(1.0)).is_err());
        assert!(opt.record_satisfaction("ghost", None, 3.0).is_err());
    }
}
