//! # Transition Executor
//!
//! The only component permitted to mutate step or workflow status. One
//! transition is applied atomically: the step row is locked, validated
//! against the transition table, written together with its audit-trail entry,
//! and the sequencer cascade runs in the same transaction.
//!
//! Concurrent attempts on the same step serialize on the row lock; the loser
//! observes the already-applied status and is answered idempotently when it
//! requested the same outcome, or with `InvalidState` when it requested a
//! different one.

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::{Result, WorkflowError};
use crate::logging::log_step_operation;
use crate::models::{StepTransition, Workflow, WorkflowStep};
use crate::resolver;
use crate::sequencer::{self, AdvanceResult};
use crate::state_machine::{Actor, StepEvent, StepStatus, WorkflowStatus};

/// A single transition request against the active step of a workflow
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub workflow_id: i64,
    pub step_id: i64,
    pub event: StepEvent,
    pub actor: Actor,
}

/// Result of a transition attempt
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The transition was applied and the cascade ran
    Applied {
        workflow: Workflow,
        step: WorkflowStep,
        advance: AdvanceResult,
    },
    /// The step had already reached the requested status; existing state is
    /// returned unchanged (`completed_at` untouched)
    AlreadyApplied {
        workflow: Workflow,
        step: WorkflowStep,
    },
}

impl TransitionOutcome {
    pub fn advance(&self) -> Option<&AdvanceResult> {
        match self {
            Self::Applied { advance, .. } => Some(advance),
            Self::AlreadyApplied { .. } => None,
        }
    }

    pub fn step(&self) -> &WorkflowStep {
        match self {
            Self::Applied { step, .. } | Self::AlreadyApplied { step, .. } => step,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        match self {
            Self::Applied { workflow, .. } | Self::AlreadyApplied { workflow, .. } => workflow,
        }
    }
}

#[derive(Clone)]
pub struct TransitionExecutor {
    pool: PgPool,
}

impl TransitionExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply one transition. Read, validate, write, and cascade happen as a
    /// single transactional unit per workflow.
    pub async fn transition(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        let target = request.event.target_status();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // Lock the workflow row first so a whole cascade serializes per
        // workflow, then the step row.
        let workflow = sqlx::query_as::<_, Workflow>(
            "SELECT id, reference_number, name, description, audit_id, sender_name, \
                    sender_department, status, current_step, created_at, updated_at \
             FROM workflows WHERE id = $1 FOR UPDATE",
        )
        .bind(request.workflow_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::not_found("workflow", request.workflow_id))?;

        let step = sqlx::query_as::<_, WorkflowStep>(
            "SELECT id, workflow_id, step_order, department_id, assigned_to_id, \
                    action_required, custom_action_text, due_date, status, notes, \
                    evidence_url, started_at, completed_at, created_at, updated_at \
             FROM workflow_steps WHERE id = $1 AND workflow_id = $2 FOR UPDATE",
        )
        .bind(request.step_id)
        .bind(request.workflow_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::not_found("step", request.step_id))?;

        let current: StepStatus = step.status()?;

        // Idempotent retry: the requested outcome is already applied. The
        // transaction only read; existing state is returned as-is.
        if current == target {
            tx.commit().await?;
            log_step_operation(
                "transition",
                Some(workflow.id),
                Some(step.id),
                &request.actor.describe(),
                &target.to_string(),
                Some("already applied; returning existing state"),
            );
            return Ok(TransitionOutcome::AlreadyApplied { workflow, step });
        }

        // Anything not in the transition table is a hard error, including a
        // different outcome on a step that already left in_progress.
        if !current.can_transition_to(target) {
            return Err(WorkflowError::InvalidState {
                step_id: step.id,
                current: current.to_string(),
                requested: target.to_string(),
            });
        }

        // Terminal workflows accept no transitions of any kind.
        if workflow.status()? != WorkflowStatus::Active {
            return Err(WorkflowError::InvalidState {
                step_id: step.id,
                current: format!("workflow {}", workflow.status),
                requested: target.to_string(),
            });
        }

        // Human actors must satisfy the assignment resolver. Automation
        // carries its rule as authorization; the system actor is the
        // reconciliation path.
        if let Actor::User {
            user_id,
            department_id,
        } = request.actor
        {
            resolver::authorize(
                &resolver::UserIdentity {
                    user_id,
                    department_id,
                },
                &step,
            )?;
        }

        let step = sqlx::query_as::<_, WorkflowStep>(
            "UPDATE workflow_steps \
             SET status = $2, completed_at = $3, updated_at = $3, \
                 notes = COALESCE($4, notes), evidence_url = COALESCE($5, evidence_url) \
             WHERE id = $1 \
             RETURNING id, workflow_id, step_order, department_id, assigned_to_id, \
                       action_required, custom_action_text, due_date, status, notes, \
                       evidence_url, started_at, completed_at, created_at, updated_at",
        )
        .bind(step.id)
        .bind(target.to_string())
        .bind(now)
        .bind(request.event.notes())
        .bind(request.event.evidence_url())
        .fetch_one(&mut *tx)
        .await?;

        StepTransition::append(
            &mut tx,
            step.id,
            Some(&current.to_string()),
            &target.to_string(),
            &request.actor.describe(),
            Some(serde_json::json!({
                "event": request.event.event_type(),
                "notes": request.event.notes(),
            })),
        )
        .await?;

        let advance =
            sequencer::apply_advance(&mut tx, workflow.id, target, step.step_order, now).await?;

        tx.commit().await?;

        log_step_operation(
            "transition",
            Some(workflow.id),
            Some(step.id),
            &request.actor.describe(),
            &target.to_string(),
            Some(&format!("advance: {advance:?}")),
        );

        // Re-read outside the transaction so the returned workflow reflects
        // the cascade (status/current_step updated by the sequencer).
        let workflow = Workflow::find_by_id(&self.pool, workflow.id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("workflow", request.workflow_id))?;

        Ok(TransitionOutcome::Applied {
            workflow,
            step,
            advance,
        })
    }
}
