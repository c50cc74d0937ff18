//! # Workflow Step Model
//!
//! One unit of required action within a workflow, owned by a department and
//! optionally a specific user.
//!
//! ## Invariants
//!
//! - `step_order` values are dense and 1-based within a workflow.
//! - At most one step per workflow is `in_progress`; everything before the
//!   active order is terminal, everything after it is `pending`.
//! - Overdue is a derived property, never stored: a step is overdue iff its
//!   due date has passed while the step is still `in_progress`.
//!
//! ## Database Schema
//!
//! Maps to the `workflow_steps` table:
//! ```sql
//! CREATE TABLE workflow_steps (
//!   id BIGSERIAL PRIMARY KEY,
//!   workflow_id BIGINT NOT NULL,
//!   step_order INTEGER NOT NULL,
//!   department_id BIGINT NOT NULL,
//!   assigned_to_id BIGINT,
//!   status TEXT NOT NULL DEFAULT 'pending',
//!   -- ... other fields
//!   UNIQUE (workflow_id, step_order)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;

use crate::error::{Result, WorkflowError};
use crate::state_machine::StepStatus;

/// The kind of action a step requires from its assignee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    ReviewAndApprove,
    Sign,
    Review,
    Acknowledge,
    CreateDocument,
    AddMinutes,
    /// Free-text action; `custom_action_text` carries the description
    Custom,
}

impl StepAction {
    /// Whether this action kind requires accompanying free text
    pub fn requires_custom_text(&self) -> bool {
        matches!(self, Self::Custom)
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReviewAndApprove => "review_and_approve",
            Self::Sign => "sign",
            Self::Review => "review",
            Self::Acknowledge => "acknowledge",
            Self::CreateDocument => "create_document",
            Self::AddMinutes => "add_minutes",
            Self::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StepAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "review_and_approve" => Ok(Self::ReviewAndApprove),
            "sign" => Ok(Self::Sign),
            "review" => Ok(Self::Review),
            "acknowledge" => Ok(Self::Acknowledge),
            "create_document" => Ok(Self::CreateDocument),
            "add_minutes" => Ok(Self::AddMinutes),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Invalid step action: {s}")),
        }
    }
}

/// An individual step row within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i32,
    pub department_id: i64,
    pub assigned_to_id: Option<i64>,
    pub action_required: String,
    pub custom_action_text: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const STEP_COLUMNS: &str = "id, workflow_id, step_order, department_id, assigned_to_id, \
     action_required, custom_action_text, due_date, status, notes, evidence_url, \
     started_at, completed_at, created_at, updated_at";

impl WorkflowStep {
    /// Parse the stored status into the closed set
    pub fn status(&self) -> Result<StepStatus> {
        self.status
            .parse()
            .map_err(|_| WorkflowError::Internal(format!("Invalid status in step row: {}", self.status)))
    }

    /// Parse the stored action kind
    pub fn action(&self) -> Result<StepAction> {
        self.action_required.parse().map_err(|_| {
            WorkflowError::Internal(format!(
                "Invalid action in step row: {}",
                self.action_required
            ))
        })
    }

    /// The single shared overdue derivation: due date passed while the step
    /// is still in progress. Never persisted.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == "in_progress" && self.due_date.is_some_and(|due| due < now)
    }

    /// Find a step by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<WorkflowStep>> {
        let step = sqlx::query_as::<_, WorkflowStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(step)
    }

    /// List all steps for a workflow, ordered ascending
    pub async fn for_workflow(pool: &PgPool, workflow_id: i64) -> Result<Vec<WorkflowStep>> {
        let steps = sqlx::query_as::<_, WorkflowStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE workflow_id = $1 ORDER BY step_order"
        ))
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;

        Ok(steps)
    }

    /// The workflow's single `in_progress` step, if any
    pub async fn active_for_workflow(
        pool: &PgPool,
        workflow_id: i64,
    ) -> Result<Option<WorkflowStep>> {
        let step = sqlx::query_as::<_, WorkflowStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps \
             WHERE workflow_id = $1 AND status = 'in_progress'"
        ))
        .bind(workflow_id)
        .fetch_optional(pool)
        .await?;

        Ok(step)
    }

    /// Steps currently in progress with a due date in the past
    pub async fn list_in_progress_past_due(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowStep>> {
        let steps = sqlx::query_as::<_, WorkflowStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps \
             WHERE status = 'in_progress' AND due_date IS NOT NULL AND due_date < $1 \
             ORDER BY due_date"
        ))
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(steps)
    }

    /// All in-progress steps (the automation sweep's candidate set)
    pub async fn list_in_progress(pool: &PgPool) -> Result<Vec<WorkflowStep>> {
        let steps = sqlx::query_as::<_, WorkflowStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE status = 'in_progress' ORDER BY id"
        ))
        .fetch_all(pool)
        .await?;

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_step(status: &str) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep {
            id: 10,
            workflow_id: 1,
            step_order: 1,
            department_id: 5,
            assigned_to_id: None,
            action_required: "review_and_approve".to_string(),
            custom_action_text: None,
            due_date: None,
            status: status.to_string(),
            notes: None,
            evidence_url: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_action_parse() {
        let step = sample_step("in_progress");
        assert_eq!(step.action().unwrap(), StepAction::ReviewAndApprove);
        assert!(StepAction::Custom.requires_custom_text());
        assert!(!StepAction::Sign.requires_custom_text());
    }

    #[test]
    fn test_overdue_is_derived_from_due_date_and_status() {
        let now = Utc::now();
        let mut step = sample_step("in_progress");

        // No due date: never overdue
        assert!(!step.is_overdue_at(now));

        step.due_date = Some(now - Duration::hours(2));
        assert!(step.is_overdue_at(now));

        // Due in the future
        step.due_date = Some(now + Duration::hours(2));
        assert!(!step.is_overdue_at(now));

        // Past due but already completed: not overdue
        step.due_date = Some(now - Duration::hours(2));
        step.status = "completed".to_string();
        assert!(!step.is_overdue_at(now));

        // Past due but not yet activated: not overdue
        step.status = "pending".to_string();
        assert!(!step.is_overdue_at(now));
    }

    #[test]
    fn test_same_step_flips_as_now_advances() {
        let step = {
            let mut s = sample_step("in_progress");
            s.due_date = Some(Utc::now());
            s
        };
        let before = step.due_date.unwrap() - Duration::minutes(1);
        let after = step.due_date.unwrap() + Duration::minutes(1);
        assert!(!step.is_overdue_at(before));
        assert!(step.is_overdue_at(after));
    }
}
