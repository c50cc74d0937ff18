//! # Assignment Resolver
//!
//! The single source of truth for "may this user act on this step right
//! now" and "is it this user's turn". Every surface (task lists, detail
//! views, the executor's authorization check) queries these functions; no
//! caller re-derives actionability on its own.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{Result, WorkflowError};
use crate::models::WorkflowStep;

/// The opaque current-user identity supplied by the upstream auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: i64,
    pub department_id: i64,
}

/// How a step relates to a user's task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepVisibility {
    /// The user's turn: step is active and assignment matches
    Actionable,
    /// Assignment matches but an earlier step is still running
    Upcoming,
    /// Not this user's concern
    None,
}

/// Whether the assignment criteria match, ignoring step status.
/// Direct assignee wins; an unassigned step falls back to department
/// membership.
fn assignment_matches(user: &UserIdentity, step: &WorkflowStep) -> bool {
    match step.assigned_to_id {
        Some(assignee) => assignee == user.user_id,
        None => step.department_id == user.department_id,
    }
}

/// A user may act on a step iff it is `in_progress` and the assignment
/// criteria match.
pub fn can_act(user: &UserIdentity, step: &WorkflowStep) -> bool {
    step.status == "in_progress" && assignment_matches(user, step)
}

/// Task-list classification for one step
pub fn visibility(user: &UserIdentity, step: &WorkflowStep) -> StepVisibility {
    if !assignment_matches(user, step) {
        return StepVisibility::None;
    }
    match step.status.as_str() {
        "in_progress" => StepVisibility::Actionable,
        "pending" => StepVisibility::Upcoming,
        _ => StepVisibility::None,
    }
}

/// Authorization check used by the transition executor for human actors
pub fn authorize(user: &UserIdentity, step: &WorkflowStep) -> Result<()> {
    if can_act(user, step) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden { step_id: step.id })
    }
}

/// One row of a user's task list: an active workflow plus the step that
/// concerns the user
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedWorkflow {
    pub workflow_id: i64,
    pub reference_number: String,
    pub workflow_name: String,
    pub audit_id: Option<i64>,
    pub step_id: i64,
    pub step_order: i32,
    pub action_required: String,
    pub step_status: String,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub actionable: bool,
}

pub struct AssignmentResolver {
    pool: PgPool,
}

impl AssignmentResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active workflows where a step is this user's turn (actionable) or
    /// coming up (upcoming). Actionable entries sort first, then by due date.
    ///
    /// The SQL predicate mirrors [`can_act`]/[`visibility`]; holding them
    /// side by side in one module keeps the derivations from drifting apart.
    pub async fn my_workflows(&self, user: &UserIdentity) -> Result<Vec<AssignedWorkflow>> {
        let rows = sqlx::query_as::<_, AssignedWorkflow>(
            "SELECT w.id AS workflow_id, w.reference_number, w.name AS workflow_name, \
                    w.audit_id, s.id AS step_id, s.step_order, s.action_required, \
                    s.status AS step_status, s.due_date, \
                    (s.status = 'in_progress') AS actionable \
             FROM workflows w \
             JOIN workflow_steps s ON s.workflow_id = w.id \
             WHERE w.status = 'active' \
               AND s.status IN ('in_progress', 'pending') \
               AND (s.assigned_to_id = $1 \
                    OR (s.assigned_to_id IS NULL AND s.department_id = $2)) \
             ORDER BY actionable DESC, s.due_date NULLS LAST, w.id, s.step_order",
        )
        .bind(user.user_id)
        .bind(user.department_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn step(status: &str, assigned_to_id: Option<i64>, department_id: i64) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep {
            id: 42,
            workflow_id: 1,
            step_order: 2,
            department_id,
            assigned_to_id,
            action_required: "sign".to_string(),
            custom_action_text: None,
            due_date: None,
            status: status.to_string(),
            notes: None,
            evidence_url: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    const ALICE: UserIdentity = UserIdentity {
        user_id: 7,
        department_id: 3,
    };

    #[test]
    fn test_department_fallback_on_unassigned_step() {
        let unassigned = step("in_progress", None, 3);
        assert!(can_act(&ALICE, &unassigned));

        let other_department = step("in_progress", None, 4);
        assert!(!can_act(&ALICE, &other_department));
    }

    #[test]
    fn test_direct_assignment_overrides_department() {
        // Assigned to Alice herself
        assert!(can_act(&ALICE, &step("in_progress", Some(7), 3)));

        // Assigned to a colleague in Alice's department: department membership
        // does not grant access once a direct assignee exists
        assert!(!can_act(&ALICE, &step("in_progress", Some(8), 3)));
    }

    #[test]
    fn test_no_action_outside_in_progress() {
        assert!(!can_act(&ALICE, &step("pending", Some(7), 3)));
        assert!(!can_act(&ALICE, &step("completed", Some(7), 3)));
        assert!(!can_act(&ALICE, &step("rejected", Some(7), 3)));
    }

    #[test]
    fn test_visibility_classification() {
        assert_eq!(
            visibility(&ALICE, &step("in_progress", None, 3)),
            StepVisibility::Actionable
        );
        assert_eq!(
            visibility(&ALICE, &step("pending", None, 3)),
            StepVisibility::Upcoming
        );
        // Completed by someone else in the department: no longer actionable
        assert_eq!(
            visibility(&ALICE, &step("completed", None, 3)),
            StepVisibility::None
        );
        assert_eq!(
            visibility(&ALICE, &step("in_progress", None, 9)),
            StepVisibility::None
        );
    }

    #[test]
    fn test_authorize_maps_to_forbidden() {
        let err = authorize(&ALICE, &step("in_progress", Some(8), 3)).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { step_id: 42 }));
    }
}
