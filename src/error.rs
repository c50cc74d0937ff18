//! Crate-wide error taxonomy.
//!
//! Validation and authorization failures are resolved locally and surfaced to
//! the caller; transient reference-allocation conflicts are retried inside the
//! registry and never escape it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed input rejected before any persistence.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced workflow, step, audit, user, or department does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The human actor does not match the assignment criteria for the step.
    #[error("actor may not act on step {step_id}")]
    Forbidden { step_id: i64 },

    /// A transition was attempted on a step that is not `in_progress`, with a
    /// different outcome than the one already applied.
    #[error("step {step_id} is {current}; cannot apply {requested}")]
    InvalidState {
        step_id: i64,
        current: String,
        requested: String,
    },

    /// Reference-number allocation kept racing past the retry bound.
    #[error("reference allocation still conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal invariant breach (e.g. an unknown status string in a row).
    #[error("internal error: {0}")]
    Internal(String),

    #[error("document storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
