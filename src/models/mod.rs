pub mod automation_rule;
pub mod step_transition;
pub mod workflow;
pub mod workflow_document;
pub mod workflow_step;

// Re-export core models for easy access
pub use automation_rule::{AutomationRule, RuleCategoryCount};
pub use step_transition::StepTransition;
pub use workflow::Workflow;
pub use workflow_document::{NewWorkflowDocument, WorkflowDocument};
pub use workflow_step::{StepAction, WorkflowStep};
