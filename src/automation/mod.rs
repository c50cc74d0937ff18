//! Rule-driven automation: typed trigger/condition/action rules and the
//! engine that evaluates them against step snapshots.

pub mod engine;
pub mod rule;

pub use engine::{AppliedRule, AutomationEngine, LifecycleEvent, OverdueFlag};
pub use rule::{CompiledRule, RuleAction, RuleCondition, StepSnapshot, TriggerKind};
