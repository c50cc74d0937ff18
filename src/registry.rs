//! # Workflow Registry
//!
//! Creates workflows and guarantees reference-number uniqueness.
//!
//! References have the form `WF-<year>-<sequence>` and are allocated from a
//! per-year counter with a single atomic upsert, so concurrent creation
//! bursts never observe the same value. The counter is the only cross-
//! workflow shared mutable resource in the subsystem.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use crate::directory::Directory;
use crate::error::{Result, WorkflowError};
use crate::logging::log_workflow_operation;
use crate::models::{StepAction, Workflow, WorkflowStep};

/// Input for one step of a new workflow
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateStepInput {
    pub step_order: i32,
    pub department_id: i64,
    pub assigned_to_id: Option<i64>,
    pub action_required: StepAction,
    pub custom_action_text: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Input for workflow creation
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateWorkflowInput {
    pub name: String,
    pub description: Option<String>,
    pub audit_id: Option<i64>,
    pub sender_name: String,
    pub sender_department: String,
    pub steps: Vec<CreateStepInput>,
}

/// A created workflow together with its steps (step 1 already active)
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedWorkflow {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
}

/// Format a reference number. Zero-padding keeps references sortable; the
/// width grows naturally past 9999.
pub fn format_reference(year: i32, sequence: i64) -> String {
    format!("WF-{year}-{sequence:04}")
}

/// Validate that step orders are a dense 1-based sequence with no duplicates,
/// and that per-step field requirements hold.
pub fn validate_steps(steps: &[CreateStepInput]) -> Result<()> {
    if steps.is_empty() {
        return Err(WorkflowError::validation("workflow requires at least one step"));
    }

    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.step_order) {
            return Err(WorkflowError::Validation(format!(
                "duplicate step_order {}",
                step.step_order
            )));
        }
        if step.action_required.requires_custom_text()
            && step
                .custom_action_text
                .as_deref()
                .map_or(true, |text| text.trim().is_empty())
        {
            return Err(WorkflowError::Validation(format!(
                "step {} has action 'custom' but no custom_action_text",
                step.step_order
            )));
        }
    }

    let expected: HashSet<i32> = (1..=steps.len() as i32).collect();
    if seen != expected {
        return Err(WorkflowError::Validation(format!(
            "step orders must be dense starting at 1; got {:?}",
            {
                let mut orders: Vec<i32> = seen.into_iter().collect();
                orders.sort_unstable();
                orders
            }
        )));
    }

    Ok(())
}

pub struct WorkflowRegistry {
    pool: PgPool,
    directory: Arc<dyn Directory>,
    allocation_retries: u32,
}

impl WorkflowRegistry {
    pub fn new(pool: PgPool, directory: Arc<dyn Directory>, allocation_retries: u32) -> Self {
        Self {
            pool,
            directory,
            allocation_retries: allocation_retries.max(1),
        }
    }

    /// Create a workflow: validate, resolve collaborator references, allocate
    /// a reference number, and persist with step 1 activated.
    pub async fn create_workflow(&self, input: CreateWorkflowInput) -> Result<CreatedWorkflow> {
        if input.name.trim().is_empty() {
            return Err(WorkflowError::validation("workflow name must not be empty"));
        }
        validate_steps(&input.steps)?;

        // Standalone workflows skip the audit check entirely.
        if let Some(audit_id) = input.audit_id {
            if !self.directory.audit_exists(audit_id).await? {
                return Err(WorkflowError::not_found("audit", audit_id));
            }
        }

        for step in &input.steps {
            if !self.directory.department_exists(step.department_id).await? {
                return Err(WorkflowError::not_found("department", step.department_id));
            }
            if let Some(user_id) = step.assigned_to_id {
                if !self.directory.user_exists(user_id).await? {
                    return Err(WorkflowError::not_found("user", user_id));
                }
            }
        }

        let year = Utc::now().year();

        // The atomic upsert makes duplicate references impossible in the
        // normal path; the retry bound covers transient serialization
        // failures, which are resolved internally and never surfaced.
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_insert(&input, year).await {
                Ok(created) => {
                    log_workflow_operation(
                        "create",
                        Some(created.workflow.id),
                        Some(&created.workflow.reference_number),
                        "active",
                        Some(&format!("{} steps", created.steps.len())),
                    );
                    return Ok(created);
                }
                Err(WorkflowError::Database(e)) if is_retryable(&e) => {
                    if attempt >= self.allocation_retries {
                        return Err(WorkflowError::Conflict { attempts: attempt });
                    }
                    warn!(
                        attempt = attempt,
                        error = %e,
                        "reference allocation conflict; retrying"
                    );
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn try_insert(&self, input: &CreateWorkflowInput, year: i32) -> Result<CreatedWorkflow> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sequence = allocate_reference(&mut tx, year).await?;
        let reference = format_reference(year, sequence);

        let workflow = sqlx::query_as::<_, Workflow>(
            "INSERT INTO workflows \
                 (reference_number, name, description, audit_id, sender_name, \
                  sender_department, status, current_step, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active', 1, $7, $7) \
             RETURNING id, reference_number, name, description, audit_id, sender_name, \
                       sender_department, status, current_step, created_at, updated_at",
        )
        .bind(&reference)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.audit_id)
        .bind(&input.sender_name)
        .bind(&input.sender_department)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut steps = Vec::with_capacity(input.steps.len());
        for step in &input.steps {
            let status = if step.step_order == 1 {
                "in_progress"
            } else {
                "pending"
            };
            let started_at = (step.step_order == 1).then_some(now);

            let row = sqlx::query_as::<_, WorkflowStep>(
                "INSERT INTO workflow_steps \
                     (workflow_id, step_order, department_id, assigned_to_id, action_required, \
                      custom_action_text, due_date, status, started_at, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
                 RETURNING id, workflow_id, step_order, department_id, assigned_to_id, \
                           action_required, custom_action_text, due_date, status, notes, \
                           evidence_url, started_at, completed_at, created_at, updated_at",
            )
            .bind(workflow.id)
            .bind(step.step_order)
            .bind(step.department_id)
            .bind(step.assigned_to_id)
            .bind(step.action_required.to_string())
            .bind(&step.custom_action_text)
            .bind(step.due_date)
            .bind(status)
            .bind(started_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            steps.push(row);
        }

        tx.commit().await?;

        steps.sort_by_key(|s| s.step_order);
        Ok(CreatedWorkflow { workflow, steps })
    }
}

/// Allocate the next sequence value for a year. A single upsert statement;
/// the database's native atomic-update primitive serializes concurrent
/// allocations per year-bucket.
async fn allocate_reference(tx: &mut Transaction<'_, Postgres>, year: i32) -> Result<i64> {
    let sequence: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO workflow_reference_sequences (year, last_value) VALUES ($1, 1) \
         ON CONFLICT (year) DO UPDATE \
             SET last_value = workflow_reference_sequences.last_value + 1 \
         RETURNING last_value",
    )
    .bind(year)
    .fetch_one(&mut **tx)
    .await?;

    Ok(sequence)
}

/// Unique violations and serialization failures are worth one more pass
/// through the allocator.
fn is_retryable(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation() || db.code().as_deref() == Some("40001"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(order: i32, action: StepAction) -> CreateStepInput {
        CreateStepInput {
            step_order: order,
            department_id: 1,
            assigned_to_id: None,
            action_required: action,
            custom_action_text: None,
            due_date: None,
        }
    }

    #[test]
    fn test_reference_format() {
        assert_eq!(format_reference(2026, 1), "WF-2026-0001");
        assert_eq!(format_reference(2026, 999), "WF-2026-0999");
        assert_eq!(format_reference(2027, 12345), "WF-2027-12345");
    }

    #[test]
    fn test_empty_steps_rejected() {
        assert!(matches!(
            validate_steps(&[]),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_dense_ordering_enforced() {
        // Starts at 2
        let gapped = [step(2, StepAction::Review), step(3, StepAction::Sign)];
        assert!(validate_steps(&gapped).is_err());

        // Gap in the middle
        let hole = [step(1, StepAction::Review), step(3, StepAction::Sign)];
        assert!(validate_steps(&hole).is_err());

        // Duplicate
        let dup = [step(1, StepAction::Review), step(1, StepAction::Sign)];
        assert!(validate_steps(&dup).is_err());

        // Dense but unsorted input is fine; order is explicit per step
        let unsorted = [
            step(2, StepAction::Sign),
            step(1, StepAction::Review),
            step(3, StepAction::Acknowledge),
        ];
        assert!(validate_steps(&unsorted).is_ok());
    }

    #[test]
    fn test_custom_action_requires_text() {
        let mut custom = step(1, StepAction::Custom);
        assert!(validate_steps(std::slice::from_ref(&custom)).is_err());

        custom.custom_action_text = Some("   ".to_string());
        assert!(validate_steps(std::slice::from_ref(&custom)).is_err());

        custom.custom_action_text = Some("collect supplier certificates".to_string());
        assert!(validate_steps(std::slice::from_ref(&custom)).is_ok());
    }
}
