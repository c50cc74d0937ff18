//! Sequencing semantics exercised end-to-end over an in-memory workflow,
//! driving the same pure decision functions the executor and sequencer use
//! against persisted rows.

use auditflow_core::sequencer::{plan_advance, AdvancePlan};
use auditflow_core::state_machine::StepStatus;
use auditflow_core::WorkflowStatus;

/// Minimal in-memory mirror of a workflow's step statuses, advanced with the
/// production decision table.
struct SimulatedWorkflow {
    status: WorkflowStatus,
    steps: Vec<StepStatus>,
    current_step: Option<usize>,
}

impl SimulatedWorkflow {
    fn new(step_count: usize) -> Self {
        assert!(step_count >= 1);
        let mut steps = vec![StepStatus::Pending; step_count];
        steps[0] = StepStatus::InProgress;
        Self {
            status: WorkflowStatus::Active,
            steps,
            current_step: Some(1),
        }
    }

    /// Apply an outcome to the active step and run the cascade
    fn transition_active(&mut self, outcome: StepStatus) {
        let order = self.current_step.expect("no active step") as i32;
        let index = (order - 1) as usize;

        assert!(self.steps[index].can_transition_to(outcome), "illegal transition");
        self.steps[index] = outcome;

        let max_order = self.steps.len() as i32;
        match plan_advance(outcome, order, max_order).expect("advance plan") {
            AdvancePlan::RejectWorkflow => {
                assert!(self.status.can_transition_to(WorkflowStatus::Rejected));
                self.status = WorkflowStatus::Rejected;
                self.current_step = None;
            }
            AdvancePlan::CompleteWorkflow => {
                assert!(self.status.can_transition_to(WorkflowStatus::Completed));
                self.status = WorkflowStatus::Completed;
                self.current_step = None;
            }
            AdvancePlan::ActivateStep { next_order } => {
                let next_index = (next_order - 1) as usize;
                assert!(self.steps[next_index].can_transition_to(StepStatus::InProgress));
                self.steps[next_index] = StepStatus::InProgress;
                self.current_step = Some(next_order as usize);
            }
        }

        self.assert_invariants();
    }

    /// The single-active-step shape: at most one in_progress step, all steps
    /// before it terminal, all steps after it pending.
    fn assert_invariants(&self) {
        let active: Vec<usize> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active())
            .map(|(i, _)| i)
            .collect();
        assert!(active.len() <= 1, "more than one active step");

        if let Some(&active_index) = active.first() {
            assert_eq!(self.current_step, Some(active_index + 1));
            assert!(self.steps[..active_index].iter().all(|s| s.is_terminal()));
            assert!(self.steps[active_index + 1..]
                .iter()
                .all(|s| *s == StepStatus::Pending));
        } else {
            assert!(self.current_step.is_none() || self.status == WorkflowStatus::Active);
        }
    }
}

#[test]
fn three_step_happy_path() {
    let mut wf = SimulatedWorkflow::new(3);
    wf.transition_active(StepStatus::Completed);
    assert_eq!(wf.current_step, Some(2));
    wf.transition_active(StepStatus::Completed);
    assert_eq!(wf.current_step, Some(3));
    wf.transition_active(StepStatus::Completed);

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.current_step, None);
    assert!(wf.steps.iter().all(|s| *s == StepStatus::Completed));
}

#[test]
fn rejection_mid_route_halts_and_never_activates_later_steps() {
    let mut wf = SimulatedWorkflow::new(3);
    wf.transition_active(StepStatus::Completed);
    wf.transition_active(StepStatus::Rejected);

    assert_eq!(wf.status, WorkflowStatus::Rejected);
    assert_eq!(wf.current_step, None);
    assert_eq!(wf.steps[0], StepStatus::Completed);
    assert_eq!(wf.steps[1], StepStatus::Rejected);
    // Step 3 was never activated
    assert_eq!(wf.steps[2], StepStatus::Pending);
}

#[test]
fn single_step_workflow_completes_directly() {
    let mut wf = SimulatedWorkflow::new(1);
    wf.transition_active(StepStatus::Completed);

    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.current_step, None);
}

#[test]
fn first_step_rejection_leaves_everything_else_pending() {
    let mut wf = SimulatedWorkflow::new(4);
    wf.transition_active(StepStatus::Rejected);

    assert_eq!(wf.status, WorkflowStatus::Rejected);
    assert!(wf.steps[1..].iter().all(|s| *s == StepStatus::Pending));
}

#[test]
fn terminal_workflow_statuses_admit_no_further_moves() {
    for terminal in [WorkflowStatus::Completed, WorkflowStatus::Rejected] {
        for target in [
            WorkflowStatus::Active,
            WorkflowStatus::Completed,
            WorkflowStatus::Rejected,
        ] {
            assert!(!terminal.can_transition_to(target));
        }
    }
}
