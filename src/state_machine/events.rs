use serde::{Deserialize, Serialize};

use super::states::StepStatus;

/// Outcomes that can be requested for the active step of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepEvent {
    /// Mark the step completed, with optional notes and evidence
    Complete {
        notes: Option<String>,
        evidence_url: Option<String>,
    },
    /// Reject the step, halting the workflow
    Reject {
        notes: Option<String>,
        evidence_url: Option<String>,
    },
}

impl StepEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "complete",
            Self::Reject { .. } => "reject",
        }
    }

    /// The step status this event requests
    pub fn target_status(&self) -> StepStatus {
        match self {
            Self::Complete { .. } => StepStatus::Completed,
            Self::Reject { .. } => StepStatus::Rejected,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Self::Complete { notes, .. } | Self::Reject { notes, .. } => notes.as_deref(),
        }
    }

    pub fn evidence_url(&self) -> Option<&str> {
        match self {
            Self::Complete { evidence_url, .. } | Self::Reject { evidence_url, .. } => {
                evidence_url.as_deref()
            }
        }
    }

    /// Create a bare completion event
    pub fn complete_simple() -> Self {
        Self::Complete {
            notes: None,
            evidence_url: None,
        }
    }

    /// Create a completion event carrying notes
    pub fn complete_with_notes(notes: impl Into<String>) -> Self {
        Self::Complete {
            notes: Some(notes.into()),
            evidence_url: None,
        }
    }

    /// Create a rejection event carrying notes
    pub fn reject_with_notes(notes: impl Into<String>) -> Self {
        Self::Reject {
            notes: Some(notes.into()),
            evidence_url: None,
        }
    }
}

/// Who requested a transition. Human requests go through the assignment
/// resolver; automation carries the rule that authorized it; `System` is the
/// reconciliation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User { user_id: i64, department_id: i64 },
    Automation { rule_id: i64 },
    System,
}

impl Actor {
    pub fn is_human(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// Label persisted on the step transition audit row
    pub fn describe(&self) -> String {
        match self {
            Self::User { user_id, .. } => format!("user:{user_id}"),
            Self::Automation { rule_id } => format!("rule:{rule_id}"),
            Self::System => "system".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_target_status() {
        assert_eq!(
            StepEvent::complete_simple().target_status(),
            StepStatus::Completed
        );
        assert_eq!(
            StepEvent::reject_with_notes("missing signature").target_status(),
            StepStatus::Rejected
        );
    }

    #[test]
    fn test_event_accessors() {
        let event = StepEvent::Complete {
            notes: Some("approved".to_string()),
            evidence_url: Some("https://files.example/sig.pdf".to_string()),
        };
        assert_eq!(event.event_type(), "complete");
        assert_eq!(event.notes(), Some("approved"));
        assert_eq!(event.evidence_url(), Some("https://files.example/sig.pdf"));
    }

    #[test]
    fn test_actor_description() {
        let actor = Actor::User {
            user_id: 7,
            department_id: 2,
        };
        assert!(actor.is_human());
        assert_eq!(actor.describe(), "user:7");
        assert_eq!(Actor::Automation { rule_id: 3 }.describe(), "rule:3");
        assert_eq!(Actor::System.describe(), "system");
    }
}
