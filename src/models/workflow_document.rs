//! Workflow attachment metadata. Purely additive: documents never gate or
//! trigger step transitions, and may be added regardless of step status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowDocument {
    pub id: i64,
    pub workflow_id: i64,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by_id: i64,
    pub created_at: DateTime<Utc>,
}

/// New document metadata for creation
#[derive(Debug, Clone)]
pub struct NewWorkflowDocument {
    pub workflow_id: i64,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by_id: i64,
}

const DOCUMENT_COLUMNS: &str =
    "id, workflow_id, file_name, file_url, file_size, mime_type, uploaded_by_id, created_at";

impl WorkflowDocument {
    /// Persist uploaded document metadata
    pub async fn create(pool: &PgPool, new_document: NewWorkflowDocument) -> Result<WorkflowDocument> {
        let document = sqlx::query_as::<_, WorkflowDocument>(&format!(
            "INSERT INTO workflow_documents \
                 (workflow_id, file_name, file_url, file_size, mime_type, uploaded_by_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(new_document.workflow_id)
        .bind(&new_document.file_name)
        .bind(&new_document.file_url)
        .bind(new_document.file_size)
        .bind(&new_document.mime_type)
        .bind(new_document.uploaded_by_id)
        .fetch_one(pool)
        .await?;

        Ok(document)
    }

    /// List documents for a workflow, newest first
    pub async fn for_workflow(pool: &PgPool, workflow_id: i64) -> Result<Vec<WorkflowDocument>> {
        let documents = sqlx::query_as::<_, WorkflowDocument>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM workflow_documents \
             WHERE workflow_id = $1 ORDER BY created_at DESC"
        ))
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;

        Ok(documents)
    }
}
