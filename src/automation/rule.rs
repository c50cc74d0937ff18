//! Typed automation rules.
//!
//! Rows in `automation_rules` hold JSONB condition/action documents; this
//! module defines the closed tagged-variant vocabulary they must use and
//! compiles rows into [`CompiledRule`]s whose conditions are pure predicates
//! over an immutable [`StepSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AutomationRule, StepAction, Workflow, WorkflowStep};

/// When a rule is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Periodic sweep; may only flag overdue, never transitions
    TimeBased,
    /// Lifecycle events: step activated, workflow completed
    EventBased,
    /// Synchronously after any applied transition
    Immediate,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeBased => write!(f, "time_based"),
            Self::EventBased => write!(f, "event_based"),
            Self::Immediate => write!(f, "immediate"),
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_based" => Ok(Self::TimeBased),
            "event_based" => Ok(Self::EventBased),
            "immediate" => Ok(Self::Immediate),
            _ => Err(format!("Invalid trigger kind: {s}")),
        }
    }
}

/// Immutable view of one step and its workflow at evaluation time
#[derive(Debug, Clone, Copy)]
pub struct StepSnapshot<'a> {
    pub workflow: &'a Workflow,
    pub step: &'a WorkflowStep,
    pub now: DateTime<Utc>,
}

/// Predicate vocabulary for rule conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// The step requires this action kind
    ActionRequiredIs { action: StepAction },
    /// The step has no direct assignee
    StepUnassigned,
    /// The step belongs to this department
    DepartmentIs { department_id: i64 },
    /// The workflow is tied to an audit (as opposed to standalone)
    AuditLinked,
    /// The step's due date has passed while it is in progress
    DueDatePassed,
    /// Every inner condition holds
    All { conditions: Vec<RuleCondition> },
    /// At least one inner condition holds
    Any { conditions: Vec<RuleCondition> },
}

impl RuleCondition {
    /// Evaluate against a snapshot. Pure: no clock reads, no I/O.
    pub fn holds(&self, snapshot: &StepSnapshot<'_>) -> bool {
        match self {
            Self::ActionRequiredIs { action } => {
                snapshot.step.action_required == action.to_string()
            }
            Self::StepUnassigned => snapshot.step.assigned_to_id.is_none(),
            Self::DepartmentIs { department_id } => {
                snapshot.step.department_id == *department_id
            }
            Self::AuditLinked => snapshot.workflow.audit_id.is_some(),
            Self::DueDatePassed => snapshot.step.is_overdue_at(snapshot.now),
            Self::All { conditions } => conditions.iter().all(|c| c.holds(snapshot)),
            Self::Any { conditions } => conditions.iter().any(|c| c.holds(snapshot)),
        }
    }
}

/// What a matching rule requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Complete the step (automation-originated transition)
    CompleteStep { notes: Option<String> },
    /// Reject the step (automation-originated transition)
    RejectStep { notes: Option<String> },
    /// Raise the overdue flag for reporting; never a transition
    FlagOverdue,
}

impl RuleAction {
    pub fn is_transition(&self) -> bool {
        !matches!(self, Self::FlagOverdue)
    }
}

/// An automation rule with its JSONB documents parsed into the typed forms
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: i64,
    pub name: String,
    pub trigger: TriggerKind,
    pub condition: RuleCondition,
    pub action: RuleAction,
    pub priority: i32,
    pub category: Option<String>,
}

impl CompiledRule {
    /// Compile a stored rule row. Fails on unknown trigger kinds or
    /// malformed condition/action documents.
    pub fn compile(rule: &AutomationRule) -> Result<CompiledRule, String> {
        let trigger: TriggerKind = rule.trigger_kind.parse()?;
        let condition: RuleCondition = serde_json::from_value(rule.condition.clone())
            .map_err(|e| format!("rule {} condition: {e}", rule.id))?;
        let action: RuleAction = serde_json::from_value(rule.action.clone())
            .map_err(|e| format!("rule {} action: {e}", rule.id))?;

        Ok(CompiledRule {
            id: rule.id,
            name: rule.name.clone(),
            trigger,
            condition,
            action,
            priority: rule.priority,
            category: rule.category.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn workflow(audit_id: Option<i64>) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: 1,
            reference_number: "WF-2026-0001".to_string(),
            name: "wf".to_string(),
            description: None,
            audit_id,
            sender_name: "s".to_string(),
            sender_department: "d".to_string(),
            status: "active".to_string(),
            current_step: Some(1),
            created_at: now,
            updated_at: now,
        }
    }

    fn step(action: &str, assigned: Option<i64>) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep {
            id: 2,
            workflow_id: 1,
            step_order: 1,
            department_id: 5,
            assigned_to_id: assigned,
            action_required: action.to_string(),
            custom_action_text: None,
            due_date: None,
            status: "in_progress".to_string(),
            notes: None,
            evidence_url: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_condition_evaluation() {
        let workflow = workflow(Some(9));
        let step = step("acknowledge", None);
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        assert!(RuleCondition::ActionRequiredIs {
            action: StepAction::Acknowledge
        }
        .holds(&snapshot));
        assert!(!RuleCondition::ActionRequiredIs {
            action: StepAction::Sign
        }
        .holds(&snapshot));
        assert!(RuleCondition::StepUnassigned.holds(&snapshot));
        assert!(RuleCondition::DepartmentIs { department_id: 5 }.holds(&snapshot));
        assert!(RuleCondition::AuditLinked.holds(&snapshot));
    }

    #[test]
    fn test_due_date_condition_uses_snapshot_clock() {
        let workflow = workflow(None);
        let mut step = step("sign", Some(3));
        let now = Utc::now();
        step.due_date = Some(now - Duration::hours(1));

        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now,
        };
        assert!(RuleCondition::DueDatePassed.holds(&snapshot));

        // Same rows, snapshot taken before the due date
        let earlier = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: now - Duration::hours(2),
        };
        assert!(!RuleCondition::DueDatePassed.holds(&earlier));
    }

    #[test]
    fn test_combinators() {
        let workflow = workflow(None);
        let step = step("acknowledge", None);
        let snapshot = StepSnapshot {
            workflow: &workflow,
            step: &step,
            now: Utc::now(),
        };

        let all = RuleCondition::All {
            conditions: vec![
                RuleCondition::StepUnassigned,
                RuleCondition::DepartmentIs { department_id: 5 },
            ],
        };
        assert!(all.holds(&snapshot));

        let any = RuleCondition::Any {
            conditions: vec![
                RuleCondition::AuditLinked,
                RuleCondition::StepUnassigned,
            ],
        };
        assert!(any.holds(&snapshot));

        let none = RuleCondition::All {
            conditions: vec![RuleCondition::AuditLinked, RuleCondition::StepUnassigned],
        };
        assert!(!none.holds(&snapshot));
    }

    #[test]
    fn test_condition_serde_wire_form() {
        let json = serde_json::json!({
            "type": "all",
            "conditions": [
                {"type": "action_required_is", "action": "acknowledge"},
                {"type": "step_unassigned"}
            ]
        });
        let condition: RuleCondition = serde_json::from_value(json).unwrap();
        assert_eq!(
            condition,
            RuleCondition::All {
                conditions: vec![
                    RuleCondition::ActionRequiredIs {
                        action: StepAction::Acknowledge
                    },
                    RuleCondition::StepUnassigned,
                ]
            }
        );

        let action: RuleAction =
            serde_json::from_value(serde_json::json!({"type": "complete_step", "notes": null}))
                .unwrap();
        assert_eq!(action, RuleAction::CompleteStep { notes: None });
        assert!(action.is_transition());
        assert!(!RuleAction::FlagOverdue.is_transition());
    }

    #[test]
    fn test_compile_rejects_malformed_rows() {
        let now = Utc::now();
        let row = AutomationRule {
            id: 1,
            name: "bad".to_string(),
            trigger_kind: "on_click".to_string(),
            condition: serde_json::json!({"type": "step_unassigned"}),
            action: serde_json::json!({"type": "flag_overdue"}),
            priority: 10,
            category: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(CompiledRule::compile(&row).is_err());

        let good = AutomationRule {
            trigger_kind: "immediate".to_string(),
            ..row
        };
        let compiled = CompiledRule::compile(&good).unwrap();
        assert_eq!(compiled.trigger, TriggerKind::Immediate);
        assert_eq!(compiled.action, RuleAction::FlagOverdue);
    }
}
