//! # Automation Rule Engine
//!
//! Evaluates configured rules against fresh state snapshots and submits
//! transitions to the executor without human input. Rules are cached in
//! priority order; each evaluation pass applies at most one matching action
//! per step (first in priority order wins — later matches are skipped for
//! the pass and re-evaluated on the next trigger), which prevents
//! double-transitioning a step that already left `in_progress`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::automation::rule::{CompiledRule, RuleAction, StepSnapshot, TriggerKind};
use crate::error::Result;
use crate::executor::{TransitionExecutor, TransitionOutcome, TransitionRequest};
use crate::models::{AutomationRule, Workflow, WorkflowStep};
use crate::sequencer::AdvanceResult;
use crate::state_machine::{Actor, StepEvent};

/// Lifecycle events the event-based trigger class reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    StepActivated { workflow_id: i64, step_id: i64 },
    WorkflowCompleted { workflow_id: i64 },
}

/// One automation-originated transition that was applied
#[derive(Debug, Clone, Serialize)]
pub struct AppliedRule {
    pub rule_id: i64,
    pub rule_name: String,
    pub step_id: i64,
    pub advance: AdvanceResult,
}

/// One overdue flag raised by the time-based sweep. Derived for reporting;
/// nothing is written back to the step.
#[derive(Debug, Clone, Serialize)]
pub struct OverdueFlag {
    pub rule_id: i64,
    pub rule_name: String,
    pub workflow_id: i64,
    pub step_id: i64,
    pub due_date: Option<DateTime<Utc>>,
}

/// Select the rule to apply this pass: the first (priority order) whose
/// condition holds. Later matches are reported back for skip logging.
pub fn select_rule<'a>(
    rules: &'a [CompiledRule],
    snapshot: &StepSnapshot<'_>,
) -> (Option<&'a CompiledRule>, Vec<&'a CompiledRule>) {
    let mut matches = rules.iter().filter(|rule| rule.condition.holds(snapshot));
    let selected = matches.next();
    (selected, matches.collect())
}

#[derive(Clone)]
pub struct AutomationEngine {
    pool: PgPool,
    rules: Arc<RwLock<Vec<CompiledRule>>>,
}

impl AutomationEngine {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            rules: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Reload and compile active rules. Malformed rows are skipped with a
    /// warning rather than poisoning the whole rule set.
    pub async fn refresh_rules(&self) -> Result<usize> {
        let rows = AutomationRule::list_active(&self.pool).await?;
        let mut compiled = Vec::with_capacity(rows.len());
        for row in &rows {
            match CompiledRule::compile(row) {
                Ok(rule) => compiled.push(rule),
                Err(reason) => warn!(rule_id = row.id, %reason, "skipping malformed automation rule"),
            }
        }
        let count = compiled.len();
        *self.rules.write() = compiled;
        Ok(count)
    }

    fn rules_for(&self, trigger: TriggerKind) -> Vec<CompiledRule> {
        self.rules
            .read()
            .iter()
            .filter(|rule| rule.trigger == trigger)
            .cloned()
            .collect()
    }

    /// React to a lifecycle event, then let immediate rules cascade.
    pub async fn on_event(
        &self,
        executor: &TransitionExecutor,
        event: LifecycleEvent,
    ) -> Result<Vec<AppliedRule>> {
        match event {
            LifecycleEvent::StepActivated {
                workflow_id,
                step_id,
            } => self.pump(executor, workflow_id, Some(step_id)).await,
            LifecycleEvent::WorkflowCompleted { workflow_id } => {
                // Terminal workflows accept no transitions; matching rules
                // are only of interest to the log.
                debug!(workflow_id, "workflow completed; no automation applies");
                Ok(Vec::new())
            }
        }
    }

    /// Administrative entry point: evaluate event-based and immediate rules
    /// for a specific step right now.
    pub async fn force_evaluate(
        &self,
        executor: &TransitionExecutor,
        workflow_id: i64,
        step_id: i64,
    ) -> Result<Vec<AppliedRule>> {
        self.pump(executor, workflow_id, Some(step_id)).await
    }

    /// Drive automation for one workflow until no more rules fire: an
    /// event-based pass for a newly activated step, then immediate passes on
    /// whatever step is active, following activations as they cascade.
    ///
    /// Bounded by the workflow's step count — each applied rule retires one
    /// step, so the loop cannot spin.
    async fn pump(
        &self,
        executor: &TransitionExecutor,
        workflow_id: i64,
        newly_activated: Option<i64>,
    ) -> Result<Vec<AppliedRule>> {
        let step_count: i64 =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workflow_steps WHERE workflow_id = $1")
                .bind(workflow_id)
                .fetch_one(&self.pool)
                .await?;

        let mut applied = Vec::new();
        let mut event_target = newly_activated;

        for _ in 0..=step_count {
            if let Some(step_id) = event_target.take() {
                if let Some(outcome) = self
                    .evaluate_pass(executor, TriggerKind::EventBased, workflow_id, step_id)
                    .await?
                {
                    if let AdvanceResult::StepActivated { step_id: next, .. } = outcome.advance {
                        event_target = Some(next);
                    }
                    applied.push(outcome);
                    continue;
                }
            }

            let Some(step) = WorkflowStep::active_for_workflow(&self.pool, workflow_id).await?
            else {
                break;
            };

            match self
                .evaluate_pass(executor, TriggerKind::Immediate, workflow_id, step.id)
                .await?
            {
                Some(outcome) => {
                    if let AdvanceResult::StepActivated { step_id: next, .. } = outcome.advance {
                        event_target = Some(next);
                    }
                    applied.push(outcome);
                }
                None => break,
            }
        }

        Ok(applied)
    }

    /// One evaluation pass of one trigger class against one step. Applies at
    /// most one action; individual application failures are logged and
    /// skipped so automation never aborts a caller's request.
    async fn evaluate_pass(
        &self,
        executor: &TransitionExecutor,
        trigger: TriggerKind,
        workflow_id: i64,
        step_id: i64,
    ) -> Result<Option<AppliedRule>> {
        let Some(workflow) = Workflow::find_by_id(&self.pool, workflow_id).await? else {
            return Ok(None);
        };
        let Some(step) = WorkflowStep::find_by_id(&self.pool, step_id).await? else {
            return Ok(None);
        };
        if workflow.status != "active" || step.status != "in_progress" {
            return Ok(None);
        }

        let rules = self.rules_for(trigger);
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        let (selected, skipped) = select_rule(&rules, &snapshot);
        for rule in skipped {
            debug!(
                rule_id = rule.id,
                step_id = step.id,
                "rule matched but another already fired this pass; deferring"
            );
        }

        let Some(rule) = selected else {
            return Ok(None);
        };

        let event = match &rule.action {
            RuleAction::CompleteStep { notes } => StepEvent::Complete {
                notes: notes.clone(),
                evidence_url: None,
            },
            RuleAction::RejectStep { notes } => StepEvent::Reject {
                notes: notes.clone(),
                evidence_url: None,
            },
            RuleAction::FlagOverdue => {
                // Overdue flags belong to the time-based sweep, not to
                // transition passes.
                debug!(rule_id = rule.id, "flag_overdue rule ignored outside sweep");
                return Ok(None);
            }
        };

        let request = TransitionRequest {
            workflow_id,
            step_id: step.id,
            event,
            actor: Actor::Automation { rule_id: rule.id },
        };

        match executor.transition(request).await {
            Ok(TransitionOutcome::Applied { advance, step, .. }) => Ok(Some(AppliedRule {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                step_id: step.id,
                advance,
            })),
            Ok(TransitionOutcome::AlreadyApplied { .. }) => {
                debug!(rule_id = rule.id, step_id = step.id, "rule outcome already applied");
                Ok(None)
            }
            Err(error) => {
                warn!(
                    rule_id = rule.id,
                    step_id = step.id,
                    %error,
                    "automation transition failed; skipping"
                );
                Ok(None)
            }
        }
    }

    /// Periodic time-based pass. Flags overdue steps for reporting; this
    /// trigger class never forces a transition, and a time-based rule
    /// configured with a transition action is refused here.
    pub async fn sweep(&self) -> Result<Vec<OverdueFlag>> {
        let rules = self.rules_for(TriggerKind::TimeBased);
        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let steps = WorkflowStep::list_in_progress(&self.pool).await?;
        let mut flags = Vec::new();

        for step in &steps {
            let Some(workflow) = Workflow::find_by_id(&self.pool, step.workflow_id).await? else {
                continue;
            };
            let snapshot = StepSnapshot {
                workflow: &workflow,
                step,
                now,
            };

            let (selected, _) = select_rule(&rules, &snapshot);
            let Some(rule) = selected else { continue };

            if rule.action.is_transition() {
                warn!(
                    rule_id = rule.id,
                    "time_based rules may not transition; skipping"
                );
                continue;
            }

            flags.push(OverdueFlag {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                workflow_id: step.workflow_id,
                step_id: step.id,
                due_date: step.due_date,
            });
        }

        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::rule::RuleCondition;
    use crate::models::StepAction;

    fn rule(id: i64, priority: i32, condition: RuleCondition) -> CompiledRule {
        CompiledRule {
            id,
            name: format!("rule-{id}"),
            trigger: TriggerKind::Immediate,
            condition,
            action: RuleAction::CompleteStep { notes: None },
            priority,
            category: None,
        }
    }

    fn snapshot_fixtures() -> (Workflow, WorkflowStep) {
        let now = Utc::now();
        let workflow = Workflow {
            id: 1,
            reference_number: "WF-2026-0001".to_string(),
            name: "wf".to_string(),
            description: None,
            audit_id: None,
            sender_name: "s".to_string(),
            sender_department: "d".to_string(),
            status: "active".to_string(),
            current_step: Some(1),
            created_at: now,
            updated_at: now,
        };
        let step = WorkflowStep {
            id: 2,
            workflow_id: 1,
            step_order: 1,
            department_id: 5,
            assigned_to_id: None,
            action_required: "acknowledge".to_string(),
            custom_action_text: None,
            due_date: None,
            status: "in_progress".to_string(),
            notes: None,
            evidence_url: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        (workflow, step)
    }

    #[test]
    fn test_first_match_wins_in_priority_order() {
        let (workflow, step) = snapshot_fixtures();
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        // Both rules match; the list is already in priority order
        let rules = vec![
            rule(10, 1, RuleCondition::StepUnassigned),
            rule(
                11,
                2,
                RuleCondition::ActionRequiredIs {
                    action: StepAction::Acknowledge,
                },
            ),
        ];

        let (selected, skipped) = select_rule(&rules, &snapshot);
        assert_eq!(selected.unwrap().id, 10);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id, 11);
    }

    #[test]
    fn test_non_matching_rules_are_not_skip_listed() {
        let (workflow, step) = snapshot_fixtures();
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        let rules = vec![
            rule(10, 1, RuleCondition::DepartmentIs { department_id: 99 }),
            rule(11, 2, RuleCondition::StepUnassigned),
        ];

        let (selected, skipped) = select_rule(&rules, &snapshot);
        assert_eq!(selected.unwrap().id, 11);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_no_match_selects_nothing() {
        let (workflow, step) = snapshot_fixtures();
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        let rules = vec![rule(10, 1, RuleCondition::AuditLinked)];
        let (selected, skipped) = select_rule(&rules, &snapshot);
        assert!(selected.is_none());
        assert!(skipped.is_empty());
    }
}
