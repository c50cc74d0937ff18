//! # Step Transition Handlers
//!
//! The human transition endpoint and the administrative auto-transition
//! trigger. All mutation goes through the transition executor; these
//! handlers only shape requests and responses.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::automation::AppliedRule;
use crate::executor::{TransitionOutcome, TransitionRequest};
use crate::models::{Workflow, WorkflowStep};
use crate::resolver::UserIdentity;
use crate::sequencer::AdvanceResult;
use crate::state_machine::{Actor, StepEvent, StepStatus};
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplyTransitionRequest {
    pub status: StepStatus,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    #[serde(flatten)]
    pub result: TransitionOutcome,
    /// Automation that fired synchronously after the transition
    pub automation: Vec<AppliedRule>,
}

/// Apply transition: PUT /v1/workflows/{id}/steps/{step_id}
pub async fn apply_transition(
    State(state): State<AppState>,
    Path((workflow_id, step_id)): Path<(i64, i64)>,
    Extension(user): Extension<UserIdentity>,
    Json(body): Json<ApplyTransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let event = match body.status {
        StepStatus::Completed => StepEvent::Complete {
            notes: body.notes,
            evidence_url: body.evidence_url,
        },
        StepStatus::Rejected => StepEvent::Reject {
            notes: body.notes,
            evidence_url: body.evidence_url,
        },
        other => {
            return Err(ApiError::bad_request(format!(
                "requested status must be completed or rejected, got {other}"
            )))
        }
    };

    let result = state
        .executor
        .transition(TransitionRequest {
            workflow_id,
            step_id,
            event,
            actor: Actor::User {
                user_id: user.user_id,
                department_id: user.department_id,
            },
        })
        .await?;

    // A newly activated step gets its automation pass before we answer.
    let automation = match result.advance() {
        Some(AdvanceResult::StepActivated { step_id: next, .. }) => {
            state
                .engine
                .on_event(
                    &state.executor,
                    crate::automation::LifecycleEvent::StepActivated {
                        workflow_id,
                        step_id: *next,
                    },
                )
                .await?
        }
        _ => Vec::new(),
    };

    Ok(Json(TransitionResponse { result, automation }))
}

#[derive(Debug, Serialize)]
pub struct AutoTransitionResponse {
    pub applied: Vec<AppliedRule>,
}

/// Force auto-transition: PUT /v1/workflows/{id}/steps/{step_id}/auto-transition
///
/// Administrative trigger: re-runs the event-based and immediate rule passes
/// for a specific step right now.
pub async fn force_auto_transition(
    State(state): State<AppState>,
    Path((workflow_id, step_id)): Path<(i64, i64)>,
) -> ApiResult<Json<AutoTransitionResponse>> {
    if Workflow::find_by_id(&state.pool, workflow_id).await?.is_none() {
        return Err(ApiError::not_found(format!("workflow {workflow_id}")));
    }
    let step = WorkflowStep::find_by_id(&state.pool, step_id)
        .await?
        .filter(|s| s.workflow_id == workflow_id)
        .ok_or_else(|| ApiError::not_found(format!("step {step_id}")))?;

    let applied = state
        .engine
        .force_evaluate(&state.executor, workflow_id, step.id)
        .await?;

    Ok(Json(AutoTransitionResponse { applied }))
}
