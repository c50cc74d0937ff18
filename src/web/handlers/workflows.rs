//! # Workflow Handlers
//!
//! Creation, task-list, detail/step listing, and the bulk auto-close
//! trigger. Business logic stays in the registry/resolver/closer; handlers
//! translate between HTTP and the engine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automation::{AppliedRule, LifecycleEvent};
use crate::models::{Workflow, WorkflowStep};
use crate::monitor::BulkCloseSummary;
use crate::registry::{CreateWorkflowInput, CreatedWorkflow};
use crate::resolver::{AssignedWorkflow, UserIdentity};
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Step serialization with the derived overdue flag attached
#[derive(Debug, Serialize)]
pub struct StepResponse {
    #[serde(flatten)]
    pub step: WorkflowStep,
    pub is_overdue: bool,
}

impl StepResponse {
    fn from_step(step: WorkflowStep) -> Self {
        let is_overdue = step.is_overdue_at(Utc::now());
        Self { step, is_overdue }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateWorkflowResponse {
    #[serde(flatten)]
    pub created: CreatedWorkflow,
    /// Automation applied synchronously at creation (e.g. auto-acknowledge
    /// of the first step)
    pub automation: Vec<AppliedRule>,
}

/// Create workflow: POST /v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflowInput>,
) -> ApiResult<(StatusCode, Json<CreateWorkflowResponse>)> {
    let created = state.registry.create_workflow(input).await?;

    // Step 1 activated; give event-based and immediate rules their pass.
    let automation = match created.steps.iter().find(|s| s.step_order == 1) {
        Some(first) => {
            state
                .engine
                .on_event(
                    &state.executor,
                    LifecycleEvent::StepActivated {
                        workflow_id: created.workflow.id,
                        step_id: first.id,
                    },
                )
                .await?
        }
        None => Vec::new(),
    };

    info!(
        workflow_id = created.workflow.id,
        reference = %created.workflow.reference_number,
        "workflow created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateWorkflowResponse { created, automation }),
    ))
}

/// List my active/upcoming workflows: GET /v1/workflows/my-workflows
pub async fn my_workflows(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<AssignedWorkflow>>> {
    let entries = state.resolver.my_workflows(&user).await?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct WorkflowDetailResponse {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub steps: Vec<StepResponse>,
}

/// Get workflow detail: GET /v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<i64>,
) -> ApiResult<Json<WorkflowDetailResponse>> {
    let workflow = Workflow::find_by_id(&state.pool, workflow_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("workflow {workflow_id}")))?;

    let steps = WorkflowStep::for_workflow(&state.pool, workflow_id)
        .await?
        .into_iter()
        .map(StepResponse::from_step)
        .collect();

    Ok(Json(WorkflowDetailResponse { workflow, steps }))
}

/// Get steps, ordered ascending: GET /v1/workflows/{id}/steps
pub async fn list_steps(
    State(state): State<AppState>,
    Path(workflow_id): Path<i64>,
) -> ApiResult<Json<Vec<StepResponse>>> {
    if Workflow::find_by_id(&state.pool, workflow_id).await?.is_none() {
        return Err(ApiError::not_found(format!("workflow {workflow_id}")));
    }

    let steps = WorkflowStep::for_workflow(&state.pool, workflow_id)
        .await?
        .into_iter()
        .map(StepResponse::from_step)
        .collect();

    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
pub struct BulkCloseParams {
    pub audit_id: Option<i64>,
}

/// Bulk auto-close: POST /v1/workflows/bulk-auto-close?audit_id=
pub async fn bulk_auto_close(
    State(state): State<AppState>,
    Query(params): Query<BulkCloseParams>,
) -> ApiResult<Json<BulkCloseSummary>> {
    let summary = state.closer.bulk_auto_close(params.audit_id).await?;
    Ok(Json(summary))
}
