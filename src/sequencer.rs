//! # Step Sequencer
//!
//! Computes the legal next state once a step leaves `in_progress` and applies
//! it inside the executor's transaction. Rejection halts the workflow;
//! completing the last step completes the workflow; otherwise the next step
//! in order activates.
//!
//! The decision is a pure function ([`plan_advance`]); the transactional
//! apply is separate so the decision table can be tested without a database.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::error::{Result, WorkflowError};
use crate::state_machine::StepStatus;

/// What the workflow should do after a step reached `outcome`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePlan {
    /// Rejection halts the whole workflow; later steps stay `pending`
    RejectWorkflow,
    /// The last step completed; the workflow is done
    CompleteWorkflow,
    /// Activate the step at this order
    ActivateStep { next_order: i32 },
}

/// The applied cascade, reported back to callers (and the automation engine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvanceResult {
    WorkflowRejected,
    WorkflowCompleted,
    StepActivated { step_id: i64, step_order: i32 },
}

/// Decide the cascade for a step that just left `in_progress`.
///
/// `max_order` is the workflow's highest step order; a single-step workflow
/// (`step_order == max_order == 1`) completes without any next-step lookup.
pub fn plan_advance(outcome: StepStatus, step_order: i32, max_order: i32) -> Result<AdvancePlan> {
    match outcome {
        StepStatus::Rejected => Ok(AdvancePlan::RejectWorkflow),
        StepStatus::Completed if step_order >= max_order => Ok(AdvancePlan::CompleteWorkflow),
        StepStatus::Completed => Ok(AdvancePlan::ActivateStep {
            next_order: step_order + 1,
        }),
        other => Err(WorkflowError::Internal(format!(
            "sequencer asked to advance from non-terminal outcome {other}"
        ))),
    }
}

/// Apply the cascade within the caller's transaction. Must run atomically
/// with the status write that triggered it.
pub(crate) async fn apply_advance(
    tx: &mut Transaction<'_, Postgres>,
    workflow_id: i64,
    outcome: StepStatus,
    step_order: i32,
    now: DateTime<Utc>,
) -> Result<AdvanceResult> {
    let max_order: i32 = sqlx::query_scalar::<_, i32>(
        "SELECT MAX(step_order) FROM workflow_steps WHERE workflow_id = $1",
    )
    .bind(workflow_id)
    .fetch_one(&mut **tx)
    .await?;

    match plan_advance(outcome, step_order, max_order)? {
        AdvancePlan::RejectWorkflow => {
            set_workflow_terminal(tx, workflow_id, "rejected", now).await?;
            Ok(AdvanceResult::WorkflowRejected)
        }
        AdvancePlan::CompleteWorkflow => {
            set_workflow_terminal(tx, workflow_id, "completed", now).await?;
            Ok(AdvanceResult::WorkflowCompleted)
        }
        AdvancePlan::ActivateStep { next_order } => {
            let step_id: i64 = sqlx::query_scalar::<_, i64>(
                "UPDATE workflow_steps \
                 SET status = 'in_progress', started_at = $3, updated_at = $3 \
                 WHERE workflow_id = $1 AND step_order = $2 AND status = 'pending' \
                 RETURNING id",
            )
            .bind(workflow_id)
            .bind(next_order)
            .bind(now)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                WorkflowError::Internal(format!(
                    "workflow {workflow_id} has no pending step at order {next_order}"
                ))
            })?;

            sqlx::query(
                "UPDATE workflows SET current_step = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(workflow_id)
            .bind(next_order)
            .bind(now)
            .execute(&mut **tx)
            .await?;

            Ok(AdvanceResult::StepActivated {
                step_id,
                step_order: next_order,
            })
        }
    }
}

async fn set_workflow_terminal(
    tx: &mut Transaction<'_, Postgres>,
    workflow_id: i64,
    status: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE workflows SET status = $2, current_step = NULL, updated_at = $3 WHERE id = $1",
    )
    .bind(workflow_id)
    .bind(status)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_halts_workflow() {
        // A middle-step rejection never activates the next step
        assert_eq!(
            plan_advance(StepStatus::Rejected, 2, 3).unwrap(),
            AdvancePlan::RejectWorkflow
        );
        assert_eq!(
            plan_advance(StepStatus::Rejected, 1, 1).unwrap(),
            AdvancePlan::RejectWorkflow
        );
    }

    #[test]
    fn test_middle_completion_activates_next() {
        assert_eq!(
            plan_advance(StepStatus::Completed, 1, 3).unwrap(),
            AdvancePlan::ActivateStep { next_order: 2 }
        );
        assert_eq!(
            plan_advance(StepStatus::Completed, 2, 3).unwrap(),
            AdvancePlan::ActivateStep { next_order: 3 }
        );
    }

    #[test]
    fn test_last_completion_completes_workflow() {
        assert_eq!(
            plan_advance(StepStatus::Completed, 3, 3).unwrap(),
            AdvancePlan::CompleteWorkflow
        );
    }

    #[test]
    fn test_single_step_shortcut() {
        // One-step workflow completes directly, no next-step lookup involved
        assert_eq!(
            plan_advance(StepStatus::Completed, 1, 1).unwrap(),
            AdvancePlan::CompleteWorkflow
        );
    }

    #[test]
    fn test_non_terminal_outcome_is_internal_error() {
        assert!(plan_advance(StepStatus::InProgress, 1, 3).is_err());
        assert!(plan_advance(StepStatus::Pending, 1, 3).is_err());
    }
}
