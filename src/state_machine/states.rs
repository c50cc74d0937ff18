use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow status definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow is routing through its steps
    Active,
    /// Every step completed
    Completed,
    /// A step was rejected; routing halted
    Rejected,
}

impl WorkflowStatus {
    /// Check if this is a terminal status (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Legality check for a workflow status change. The only legal moves are
    /// out of `Active`; terminal statuses admit nothing.
    pub fn can_transition_to(self, target: WorkflowStatus) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Completed) | (Self::Active, Self::Rejected)
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Workflow step status definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting for an earlier step to finish
    Pending,
    /// The single active step of its workflow
    InProgress,
    /// Acted on successfully
    Completed,
    /// Refused; halts the workflow
    Rejected,
}

impl StepStatus {
    /// Check if this is a terminal status (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Check if this is the active status (step can be acted on)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// The transition table. Activation moves `Pending` to `InProgress`
    /// (sequencer only); human/automation outcomes move `InProgress` to a
    /// terminal status. Everything else is illegal.
    pub fn can_transition_to(self, target: StepStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Rejected)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_status_terminal_check() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Rejected.is_terminal());
        assert!(!WorkflowStatus::Active.is_terminal());
    }

    #[test]
    fn test_step_transition_table() {
        assert!(StepStatus::Pending.can_transition_to(StepStatus::InProgress));
        assert!(StepStatus::InProgress.can_transition_to(StepStatus::Completed));
        assert!(StepStatus::InProgress.can_transition_to(StepStatus::Rejected));

        // No skipping activation, no resurrection of terminal steps
        assert!(!StepStatus::Pending.can_transition_to(StepStatus::Completed));
        assert!(!StepStatus::Pending.can_transition_to(StepStatus::Rejected));
        assert!(!StepStatus::Completed.can_transition_to(StepStatus::InProgress));
        assert!(!StepStatus::Rejected.can_transition_to(StepStatus::Pending));
    }

    #[test]
    fn test_workflow_transition_table() {
        assert!(WorkflowStatus::Active.can_transition_to(WorkflowStatus::Completed));
        assert!(WorkflowStatus::Active.can_transition_to(WorkflowStatus::Rejected));
        assert!(!WorkflowStatus::Completed.can_transition_to(WorkflowStatus::Active));
        assert!(!WorkflowStatus::Rejected.can_transition_to(WorkflowStatus::Completed));
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(StepStatus::InProgress.to_string(), "in_progress");
        assert_eq!("completed".parse::<StepStatus>().unwrap(), StepStatus::Completed);

        assert_eq!(WorkflowStatus::Rejected.to_string(), "rejected");
        assert_eq!(
            "active".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::Active
        );
        assert!("cancelled".parse::<StepStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let status = StepStatus::InProgress;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: StepStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
