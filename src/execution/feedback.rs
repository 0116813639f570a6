//! Feedback Collection
//!
//! Turns an execution result into structured feedback items: one overall
//! verdict, per-subgoal outcomes, improvement hints derived from adaptations,
//! and performance observations. Insight extraction over collected items is
//! best-effort token mining, documented as such.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::execution::engine::{ExecutionResult, StepOutcome};
use crate::planning::orchestrator::Plan;

/// Kinds of feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Success,
    Error,
    Warning,
    Insight,
    Improvement,
}

/// Where a feedback item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSource {
    Execution,
    User,
    #[serde(rename = "self")]
    SelfGenerated,
    System,
}

/// Severity of a feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSeverity {
    Low,
    Medium,
    High,
}

/// One piece of feedback about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    pub feedback_type: FeedbackType,
    pub content: String,
    pub source: FeedbackSource,
    pub severity: FeedbackSeverity,
    pub subgoal_id: Option<String>,
    pub timestamp: i64,
    /// Numeric measurements for external charting, if any
    pub metrics: Option<HashMap<String, f64>>,
}

impl FeedbackItem {
    fn new(feedback_type: FeedbackType, severity: FeedbackSeverity, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            feedback_type,
            content,
            source: FeedbackSource::Execution,
            severity,
            subgoal_id: None,
            timestamp: chrono::Utc::now().timestamp(),
            metrics: None,
        }
    }

    fn for_subgoal(mut self, subgoal_id: &str) -> Self {
        self.subgoal_id = Some(subgoal_id.to_string());
        self
    }

    fn with_metrics(mut self, metrics: HashMap<String, f64>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Feedback thresholds.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    /// Completion ratio at or above which a partial run is only a warning
    pub warning_ratio: f64,
    /// Run duration above this draws a warning
    pub slow_ms: u64,
    /// Run duration above this draws an error
    pub very_slow_ms: u64,
    /// Adaptations per completed step above this draws a warning
    pub adaptation_density: f64,
    /// Minimum error items a token must appear in to count as a pattern
    pub pattern_min_count: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            warning_ratio: 0.7,
            slow_ms: 10_000,
            very_slow_ms: 30_000,
            adaptation_density: 0.3,
            pattern_min_count: 2,
        }
    }
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{5,}").expect("valid regex"));

/// Mines structured feedback from execution results.
#[derive(Debug, Clone, Default)]
pub struct FeedbackCollector {
    config: FeedbackConfig,
}

impl FeedbackCollector {
    pub fn new() -> Self {
        Self::with_config(FeedbackConfig::default())
    }

    pub fn with_config(config: FeedbackConfig) -> Self {
        Self { config }
    }

    /// Produce the feedback set for one run. Always yields at least the
    /// overall item.
    pub fn collect(&self, plan: &Plan, result: &ExecutionResult) -> Vec<FeedbackItem> {
        let total = plan.subgoals.len().max(1);
        let ratio = result.steps_completed as f64 / total as f64;
        // Adaptations per completed step, not per planned subgoal.
        let density =
            result.adaptations.len() as f64 / result.steps_completed.max(1) as f64;

        let mut items = Vec::new();

        let mut metrics = HashMap::new();
        metrics.insert("completion_ratio".to_string(), ratio);
        metrics.insert("duration_ms".to_string(), result.duration_ms as f64);
        metrics.insert("adaptation_density".to_string(), density);

        let overall = if ratio >= 1.0 {
            FeedbackItem::new(
                FeedbackType::Success,
                FeedbackSeverity::Low,
                format!("Plan completed: all {} subgoal(s) succeeded", total),
            )
        } else if ratio >= self.config.warning_ratio {
            FeedbackItem::new(
                FeedbackType::Warning,
                FeedbackSeverity::Medium,
                format!(
                    "Plan mostly completed: {}/{} subgoals succeeded",
                    result.steps_completed, total
                ),
            )
        } else {
            FeedbackItem::new(
                FeedbackType::Error,
                FeedbackSeverity::High,
                format!(
                    "Plan largely failed: only {}/{} subgoals succeeded",
                    result.steps_completed, total
                ),
            )
        };
        items.push(overall.with_metrics(metrics));

        // Per-subgoal items, in plan order so output is stable.
        for subgoal in &plan.subgoals {
            let Some(outcome) = result.step_results.get(&subgoal.id) else {
                continue;
            };
            match outcome {
                StepOutcome::Success { summary, .. } => {
                    items.push(
                        FeedbackItem::new(
                            FeedbackType::Success,
                            FeedbackSeverity::Low,
                            format!("Subgoal succeeded: {}", summary),
                        )
                        .for_subgoal(&subgoal.id),
                    );
                }
                StepOutcome::Failure { error, .. } => {
                    items.push(
                        FeedbackItem::new(
                            FeedbackType::Error,
                            FeedbackSeverity::High,
                            format!("Subgoal failed: {}", error),
                        )
                        .for_subgoal(&subgoal.id),
                    );

                    if let Some(adaptation) =
                        result.adaptations.iter().find(|a| a.step == subgoal.id)
                    {
                        items.push(
                            FeedbackItem::new(
                                FeedbackType::Improvement,
                                FeedbackSeverity::Medium,
                                format!("Suggested adjustment: {}", adaptation.adaptation),
                            )
                            .for_subgoal(&subgoal.id),
                        );
                    }
                }
            }
        }

        if result.duration_ms > self.config.very_slow_ms {
            items.push(FeedbackItem::new(
                FeedbackType::Error,
                FeedbackSeverity::High,
                format!("Run took {} ms, far beyond budget", result.duration_ms),
            ));
        } else if result.duration_ms > self.config.slow_ms {
            items.push(FeedbackItem::new(
                FeedbackType::Warning,
                FeedbackSeverity::Medium,
                format!("Run took {} ms, slower than expected", result.duration_ms),
            ));
        }

        if density > self.config.adaptation_density {
            items.push(FeedbackItem::new(
                FeedbackType::Warning,
                FeedbackSeverity::Medium,
                format!(
                    "High adaptation rate: {} adaptation(s) across {} subgoal(s)",
                    result.adaptations.len(),
                    total
                ),
            ));
        }

        debug!("Collected {} feedback items for plan {}", items.len(), plan.id);
        items
    }

    /// Mine recurring failure tokens from error items. Best-effort: token
    /// co-occurrence only, no semantic grouping. Output order is
    /// deterministic (token-sorted).
    pub fn extract_insights(&self, items: &[FeedbackItem]) -> Vec<String> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        for item in items {
            if item.feedback_type != FeedbackType::Error {
                continue;
            }
            let mut seen = std::collections::HashSet::new();
            for token in WORD.find_iter(&item.content) {
                let token = token.as_str().to_lowercase();
                // Count each token once per item.
                if seen.insert(token.clone()) {
                    *counts.entry(token).or_insert(0) += 1;
                }
            }
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count >= self.config.pattern_min_count)
            .map(|(token, count)| {
                format!("Common failure pattern: '{}' ({} occurrences)", token, count)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::engine::Adaptation;
    use crate::planning::decomposer::Subgoal;

    fn plan_of(subgoals: Vec<Subgoal>) -> Plan {
        Plan {
            id: "plan-1".to_string(),
            objective: "objective".to_string(),
            estimated_steps: subgoals.len(),
            subgoals,
            thoughts: vec![],
            reflections: vec![],
            criticisms: vec![],
            capabilities_required: vec![],
            created_at: 0,
        }
    }

    fn result_for(plan: &Plan, failures: &[usize]) -> ExecutionResult {
        let mut step_results = HashMap::new();
        let mut adaptations = Vec::new();
        let mut completed = 0;

        for (i, sg) in plan.subgoals.iter().enumerate() {
            if failures.contains(&i) {
                step_results.insert(
                    sg.id.clone(),
                    StepOutcome::Failure {
                        error: "request timed out while fetching remote resource".to_string(),
                        adaptation: Some("Simplified the subgoal scope".to_string()),
                    },
                );
                adaptations.push(Adaptation {
                    step: sg.id.clone(),
                    reason: "timed out".to_string(),
                    adaptation: "Simplified the subgoal scope".to_string(),
                });
            } else {
                completed += 1;
                step_results.insert(
                    sg.id.clone(),
                    StepOutcome::Success {
                        capability_results: vec![],
                        summary: "done".to_string(),
                    },
                );
            }
        }

        ExecutionResult {
            id: "exec-1".to_string(),
            plan_id: plan.id.clone(),
            steps_completed: completed,
            step_results,
            adaptations,
            started_at: 0,
            finished_at: 1,
            duration_ms: 100,
        }
    }

    fn subgoals(n: usize) -> Vec<Subgoal> {
        (0..n)
            .map(|i| Subgoal::new(&format!("A perfectly reasonable subgoal number {}", i)))
            .collect()
    }

    #[test]
    fn test_full_completion_yields_overall_success() {
        let plan = plan_of(subgoals(3));
        let result = result_for(&plan, &[]);
        let items = FeedbackCollector::new().collect(&plan, &result);

        assert_eq!(items[0].feedback_type, FeedbackType::Success);
        let metrics = items[0].metrics.as_ref().unwrap();
        assert_eq!(metrics["completion_ratio"], 1.0);
        // Overall + one per subgoal.
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_partial_completion_is_warning_then_error() {
        let plan = plan_of(subgoals(4));

        let one_failure = result_for(&plan, &[3]);
        let items = FeedbackCollector::new().collect(&plan, &one_failure);
        assert_eq!(items[0].feedback_type, FeedbackType::Warning);

        let many_failures = result_for(&plan, &[1, 2, 3]);
        let items = FeedbackCollector::new().collect(&plan, &many_failures);
        assert_eq!(items[0].feedback_type, FeedbackType::Error);
    }

    #[test]
    fn test_failed_subgoal_pairs_error_with_improvement() {
        let plan = plan_of(subgoals(3));
        let result = result_for(&plan, &[1]);
        let items = FeedbackCollector::new().collect(&plan, &result);

        let failed_id = &plan.subgoals[1].id;
        let error = items.iter().find(|i| {
            i.feedback_type == FeedbackType::Error && i.subgoal_id.as_ref() == Some(failed_id)
        });
        let improvement = items.iter().find(|i| {
            i.feedback_type == FeedbackType::Improvement && i.subgoal_id.as_ref() == Some(failed_id)
        });
        assert!(error.is_some());
        assert!(improvement.is_some());
    }

    #[test]
    fn test_slow_run_flagged() {
        let plan = plan_of(subgoals(2));
        let mut result = result_for(&plan, &[]);
        result.duration_ms = 15_000;

        let items = FeedbackCollector::new().collect(&plan, &result);
        assert!(items.iter().any(|i| i.content.contains("slower")));

        result.duration_ms = 45_000;
        let items = FeedbackCollector::new().collect(&plan, &result);
        assert!(items.iter().any(|i| i.content.contains("far beyond")));
    }

    #[test]
    fn test_high_adaptation_density_flagged() {
        let plan = plan_of(subgoals(3));
        // One completed step, two adaptations: density 2.0.
        let result = result_for(&plan, &[0, 1]);
        let items = FeedbackCollector::new().collect(&plan, &result);
        assert!(items.iter().any(|i| i.content.contains("adaptation rate")));
    }

    #[test]
    fn test_adaptation_density_is_relative_to_completed_steps() {
        // 7 of 10 completed with 3 adaptations: 3/7 over the threshold, even
        // though 3/10 would not be.
        let plan = plan_of(subgoals(10));
        let result = result_for(&plan, &[7, 8, 9]);
        let items = FeedbackCollector::new().collect(&plan, &result);

        assert!(items.iter().any(|i| i.content.contains("adaptation rate")));
        let metrics = items[0].metrics.as_ref().unwrap();
        assert!((metrics["adaptation_density"] - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_levels() {
        let plan = plan_of(subgoals(4));
        let result = result_for(&plan, &[1, 2, 3]);
        let items = FeedbackCollector::new().collect(&plan, &result);

        assert_eq!(items[0].severity, FeedbackSeverity::High);
        for item in &items {
            match item.feedback_type {
                FeedbackType::Success => assert_eq!(item.severity, FeedbackSeverity::Low),
                FeedbackType::Improvement => assert_eq!(item.severity, FeedbackSeverity::Medium),
                _ => {}
            }
        }
        assert_eq!(
            serde_json::to_string(&FeedbackSeverity::Medium).unwrap(),
            "\"medium\""
        );
    }

    #[test]
    fn test_collect_never_empty() {
        let plan = plan_of(subgoals(1));
        let mut result = result_for(&plan, &[]);
        result.step_results.clear();
        result.steps_completed = 0;

        let items = FeedbackCollector::new().collect(&plan, &result);
        assert!(!items.is_empty());
    }

    #[test]
    fn test_insights_require_recurrence() {
        let plan = plan_of(subgoals(4));
        let result = result_for(&plan, &[0, 1]);
        let items = FeedbackCollector::new().collect(&plan, &result);

        let insights = FeedbackCollector::new().extract_insights(&items);
        // "timed" and "resource" recur across the two error items.
        assert!(insights.iter().any(|i| i.contains("'timed'")));

        let single = FeedbackCollector::new().collect(&plan, &result_for(&plan, &[]));
        assert!(FeedbackCollector::new().extract_insights(&single).is_empty());
    }

    #[test]
    fn test_self_source_serializes_as_self() {
        let json = serde_json::to_string(&FeedbackSource::SelfGenerated).unwrap();
        assert_eq!(json, "\"self\"");
    }
}
