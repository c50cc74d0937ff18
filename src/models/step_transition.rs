//! Append-only audit trail of step status changes.
//!
//! Every executor transition appends one row inside the same transaction as
//! the status write. `sort_key` orders a step's transitions; `most_recent`
//! marks the row reflecting the current status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StepTransition {
    pub id: i64,
    pub workflow_step_id: i64,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor: String,
    pub sort_key: i32,
    pub most_recent: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

const TRANSITION_COLUMNS: &str = "id, workflow_step_id, from_status, to_status, actor, \
     sort_key, most_recent, metadata, created_at";

impl StepTransition {
    /// Append a transition row for a step within the caller's transaction.
    /// Demotes the previous `most_recent` row in the same statement batch.
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        workflow_step_id: i64,
        from_status: Option<&str>,
        to_status: &str,
        actor: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let next_key: i32 = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(sort_key), 0) + 1 FROM workflow_step_transitions \
             WHERE workflow_step_id = $1",
        )
        .bind(workflow_step_id)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "UPDATE workflow_step_transitions SET most_recent = FALSE \
             WHERE workflow_step_id = $1 AND most_recent = TRUE",
        )
        .bind(workflow_step_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO workflow_step_transitions \
                 (workflow_step_id, from_status, to_status, actor, sort_key, most_recent, metadata) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6)",
        )
        .bind(workflow_step_id)
        .bind(from_status)
        .bind(to_status)
        .bind(actor)
        .bind(next_key)
        .bind(metadata)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Full transition history for a step, oldest first
    pub async fn for_step(pool: &PgPool, workflow_step_id: i64) -> Result<Vec<StepTransition>> {
        let transitions = sqlx::query_as::<_, StepTransition>(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM workflow_step_transitions \
             WHERE workflow_step_id = $1 ORDER BY sort_key"
        ))
        .bind(workflow_step_id)
        .fetch_all(pool)
        .await?;

        Ok(transitions)
    }
}
