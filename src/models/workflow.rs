//! # Workflow Model
//!
//! Top-level routing record. Identity (`reference_number`) and sender fields
//! are assigned at creation and never mutated; `status` and `current_step`
//! change only through the transition executor and sequencer.
//!
//! ## Database Schema
//!
//! Maps to the `workflows` table:
//! ```sql
//! CREATE TABLE workflows (
//!   id BIGSERIAL PRIMARY KEY,
//!   reference_number TEXT NOT NULL UNIQUE,
//!   status TEXT NOT NULL DEFAULT 'active',
//!   current_step INTEGER,
//!   -- ... other fields
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{Result, WorkflowError};
use crate::state_machine::WorkflowStatus;

/// A routed approval/document workflow.
///
/// `status` is stored as text and parsed through [`Workflow::status`]; rows
/// only ever hold members of the closed [`WorkflowStatus`] set because all
/// writes go through the transition executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workflow {
    pub id: i64,
    pub reference_number: String,
    pub name: String,
    pub description: Option<String>,
    pub audit_id: Option<i64>,
    pub sender_name: String,
    pub sender_department: String,
    pub status: String,
    pub current_step: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const WORKFLOW_COLUMNS: &str = "id, reference_number, name, description, audit_id, \
     sender_name, sender_department, status, current_step, created_at, updated_at";

impl Workflow {
    /// Parse the stored status into the closed set
    pub fn status(&self) -> Result<WorkflowStatus> {
        self.status
            .parse()
            .map_err(|_| WorkflowError::Internal(format!("Invalid status in workflow row: {}", self.status)))
    }

    /// Whether the workflow is standalone (not tied to an audit)
    pub fn is_standalone(&self) -> bool {
        self.audit_id.is_none()
    }

    /// Find a workflow by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Workflow>> {
        let workflow = sqlx::query_as::<_, Workflow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(workflow)
    }

    /// Find a workflow by its immutable reference number
    pub async fn find_by_reference(pool: &PgPool, reference: &str) -> Result<Option<Workflow>> {
        let workflow = sqlx::query_as::<_, Workflow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE reference_number = $1"
        ))
        .bind(reference)
        .fetch_optional(pool)
        .await?;

        Ok(workflow)
    }

    /// List workflows for one audit, newest first
    pub async fn list_by_audit(pool: &PgPool, audit_id: i64) -> Result<Vec<Workflow>> {
        let workflows = sqlx::query_as::<_, Workflow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE audit_id = $1 ORDER BY created_at DESC"
        ))
        .bind(audit_id)
        .fetch_all(pool)
        .await?;

        Ok(workflows)
    }

    /// Workflows still marked `active` although every step has completed.
    /// These are the recovery candidates the bulk closer reconciles.
    pub async fn list_active_fully_completed(
        pool: &PgPool,
        audit_id: Option<i64>,
    ) -> Result<Vec<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows w \
             WHERE w.status = 'active' \
               AND ($1::BIGINT IS NULL OR w.audit_id = $1) \
               AND EXISTS (SELECT 1 FROM workflow_steps s WHERE s.workflow_id = w.id) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM workflow_steps s \
                   WHERE s.workflow_id = w.id AND s.status <> 'completed') \
             ORDER BY w.id"
        );

        let workflows = sqlx::query_as::<_, Workflow>(&sql)
            .bind(audit_id)
            .fetch_all(pool)
            .await?;

        Ok(workflows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_workflow(status: &str) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: 1,
            reference_number: "WF-2026-0001".to_string(),
            name: "Internal audit follow-up".to_string(),
            description: None,
            audit_id: Some(9),
            sender_name: "Quality Office".to_string(),
            sender_department: "QA".to_string(),
            status: status.to_string(),
            current_step: Some(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            sample_workflow("active").status().unwrap(),
            WorkflowStatus::Active
        );
        assert!(sample_workflow("archived").status().is_err());
    }

    #[test]
    fn test_standalone_detection() {
        let mut workflow = sample_workflow("active");
        assert!(!workflow.is_standalone());
        workflow.audit_id = None;
        assert!(workflow.is_standalone());
    }
}
