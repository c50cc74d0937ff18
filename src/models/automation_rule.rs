//! # Automation Rule Model
//!
//! Configured trigger/condition/action tuples. `condition` and `action` are
//! JSONB columns holding the tagged-variant forms defined in
//! [`crate::automation::rule`]; rows are compiled into typed rules before
//! evaluation, so malformed configuration is rejected at load time rather
//! than mid-pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AutomationRule {
    pub id: i64,
    pub name: String,
    pub trigger_kind: String,
    pub condition: serde_json::Value,
    pub action: serde_json::Value,
    pub priority: i32,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rule count per category, for the rule listing endpoint
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RuleCategoryCount {
    pub category: Option<String>,
    pub count: i64,
}

const RULE_COLUMNS: &str = "id, name, trigger_kind, condition, action, priority, category, \
     is_active, created_at, updated_at";

impl AutomationRule {
    /// Active rules in configured priority order (priority ascending, then
    /// id — the order first-match-wins evaluation relies on)
    pub async fn list_active(pool: &PgPool) -> Result<Vec<AutomationRule>> {
        let rules = sqlx::query_as::<_, AutomationRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules \
             WHERE is_active = TRUE ORDER BY priority, id"
        ))
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }

    /// All configured rules, active or not
    pub async fn list_all(pool: &PgPool) -> Result<Vec<AutomationRule>> {
        let rules = sqlx::query_as::<_, AutomationRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules ORDER BY priority, id"
        ))
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }

    /// Rule counts grouped by category
    pub async fn category_counts(pool: &PgPool) -> Result<Vec<RuleCategoryCount>> {
        let counts = sqlx::query_as::<_, RuleCategoryCount>(
            "SELECT category, COUNT(*) AS count FROM automation_rules \
             GROUP BY category ORDER BY count DESC, category",
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }
}
