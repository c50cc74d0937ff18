//! # Workflow Document Handlers
//!
//! Attachment upload and listing. Uploads delegate to the storage
//! collaborator and only persist metadata here; they are accepted at any
//! time regardless of step status and never touch the state machine.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use crate::models::{NewWorkflowDocument, Workflow, WorkflowDocument};
use crate::resolver::UserIdentity;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Upload attachment: POST /v1/workflows/{id}/documents
pub async fn upload_document(
    State(state): State<AppState>,
    Path(workflow_id): Path<i64>,
    Extension(user): Extension<UserIdentity>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<WorkflowDocument>)> {
    if Workflow::find_by_id(&state.pool, workflow_id).await?.is_none() {
        return Err(ApiError::not_found(format!("workflow {workflow_id}")));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
        .ok_or_else(|| ApiError::bad_request("multipart body carries no file field"))?;

    let file_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("file field has no filename"))?;
    let mime_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let content = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed reading upload: {e}")))?;

    let stored = state.documents.store(&file_name, &content).await?;

    let document = WorkflowDocument::create(
        &state.pool,
        NewWorkflowDocument {
            workflow_id,
            file_name,
            file_url: stored.file_url,
            file_size: stored.file_size,
            mime_type,
            uploaded_by_id: user.user_id,
        },
    )
    .await?;

    info!(
        workflow_id,
        document_id = document.id,
        size = document.file_size,
        "document attached"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

/// List attachments: GET /v1/workflows/{id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path(workflow_id): Path<i64>,
) -> ApiResult<Json<Vec<WorkflowDocument>>> {
    if Workflow::find_by_id(&state.pool, workflow_id).await?.is_none() {
        return Err(ApiError::not_found(format!("workflow {workflow_id}")));
    }

    let documents = WorkflowDocument::for_workflow(&state.pool, workflow_id).await?;
    Ok(Json(documents))
}
