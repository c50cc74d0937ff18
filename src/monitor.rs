//! # Overdue Monitor & Bulk Closer
//!
//! Periodic reconciliation across many workflows. The overdue scan is
//! read-only — overdue is a derived, queryable property, never stored state.
//! The bulk closer completes workflows whose steps are all done but whose
//! workflow record missed its final transition (a partial-failure recovery
//! case); it re-checks every row under lock immediately before mutating, so
//! it can run concurrently with live human transitions and repeatedly
//! without effect.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use crate::error::Result;
use crate::logging::log_batch_operation;
use crate::models::{StepTransition, Workflow};
use crate::state_machine::Actor;

/// One overdue step, joined with its workflow for reporting
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OverdueStep {
    pub workflow_id: i64,
    pub reference_number: String,
    pub workflow_name: String,
    pub step_id: i64,
    pub step_order: i32,
    pub department_id: i64,
    pub assigned_to_id: Option<i64>,
    pub due_date: DateTime<Utc>,
}

pub struct OverdueMonitor {
    pool: PgPool,
}

impl OverdueMonitor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every `in_progress` step whose due date has passed, most overdue
    /// first. Reads only; step rows are untouched.
    pub async fn scan_overdue(&self, now: DateTime<Utc>) -> Result<Vec<OverdueStep>> {
        let rows = sqlx::query_as::<_, OverdueStep>(
            "SELECT w.id AS workflow_id, w.reference_number, w.name AS workflow_name, \
                    s.id AS step_id, s.step_order, s.department_id, s.assigned_to_id, \
                    s.due_date \
             FROM workflow_steps s \
             JOIN workflows w ON w.id = s.workflow_id \
             WHERE s.status = 'in_progress' AND s.due_date IS NOT NULL AND s.due_date < $1 \
             ORDER BY s.due_date",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Summary of one bulk auto-close run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkCloseSummary {
    /// Candidates the scan produced
    pub examined: usize,
    /// Workflow ids completed by this run
    pub completed: Vec<i64>,
    /// Candidates that no longer qualified at mutation time
    pub skipped: usize,
    /// Per-item failures, logged and isolated from the rest of the batch
    pub failed: Vec<BulkCloseFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCloseFailure {
    pub workflow_id: i64,
    pub error: String,
}

pub struct BulkCloser {
    pool: PgPool,
}

impl BulkCloser {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Complete every workflow (optionally scoped to one audit) whose steps
    /// have all completed while the workflow record still says `active`.
    /// Safe to run repeatedly: already-completed workflows never qualify.
    pub async fn bulk_auto_close(&self, audit_id: Option<i64>) -> Result<BulkCloseSummary> {
        let candidates = Workflow::list_active_fully_completed(&self.pool, audit_id).await?;

        let mut summary = BulkCloseSummary {
            examined: candidates.len(),
            ..Default::default()
        };

        for workflow in candidates {
            match self.close_one(workflow.id).await {
                Ok(true) => summary.completed.push(workflow.id),
                Ok(false) => summary.skipped += 1,
                Err(error) => {
                    warn!(workflow_id = workflow.id, %error, "bulk auto-close item failed");
                    summary.failed.push(BulkCloseFailure {
                        workflow_id: workflow.id,
                        error: error.to_string(),
                    });
                }
            }
        }

        log_batch_operation(
            "bulk_auto_close",
            summary.examined,
            summary.completed.len(),
            summary.skipped,
            summary.failed.len(),
        );

        Ok(summary)
    }

    /// Close a single candidate. The row is re-checked under lock because a
    /// live transition may have landed between the scan and this mutation.
    async fn close_one(&self, workflow_id: i64) -> Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let still_eligible: Option<i64> = sqlx::query_scalar::<_, i64>(
            "SELECT w.id FROM workflows w \
             WHERE w.id = $1 AND w.status = 'active' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM workflow_steps s \
                   WHERE s.workflow_id = w.id AND s.status <> 'completed') \
             FOR UPDATE OF w",
        )
        .bind(workflow_id)
        .fetch_optional(&mut *tx)
        .await?;

        if still_eligible.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE workflows SET status = 'completed', current_step = NULL, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(workflow_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Leave a trace on the last step's audit trail so the recovery is
        // attributable.
        let last_step: Option<i64> = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM workflow_steps WHERE workflow_id = $1 \
             ORDER BY step_order DESC LIMIT 1",
        )
        .bind(workflow_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(step_id) = last_step {
            StepTransition::append(
                &mut tx,
                step_id,
                Some("completed"),
                "completed",
                &Actor::System.describe(),
                Some(serde_json::json!({"event": "bulk_auto_close"})),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
