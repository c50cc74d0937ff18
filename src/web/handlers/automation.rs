//! Automation rule listing: configured rules plus per-category counts.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::models::{AutomationRule, RuleCategoryCount};
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct RuleListResponse {
    pub rules: Vec<AutomationRule>,
    pub category_counts: Vec<RuleCategoryCount>,
}

/// List automation rules: GET /v1/workflows/automation-rules
pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<RuleListResponse>> {
    let rules = AutomationRule::list_all(&state.pool).await?;
    let category_counts = AutomationRule::category_counts(&state.pool).await?;

    Ok(Json(RuleListResponse {
        rules,
        category_counts,
    }))
}
