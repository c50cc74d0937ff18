#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Auditflow Core
//!
//! Workflow routing and automation engine for ISO-audit management.
//!
//! ## Overview
//!
//! Auditflow Core owns the sequential approval/document-routing process of
//! the audit platform: ordered steps with role-based assignment, due-date
//! tracking, rule-driven automatic transitions, and idempotent bulk
//! reconciliation. CRUD for assets, users, departments, and audits lives in
//! collaborating services; this crate holds the state machine and everything
//! that is allowed to touch it.
//!
//! ## Guarantees
//!
//! - Exactly one step per workflow is `in_progress` at any time.
//! - Actionability ("may this user act now") has a single source of truth in
//!   the assignment resolver.
//! - Transitions are applied by exactly one component, atomically with their
//!   cascade, and retries on already-transitioned steps are answered
//!   idempotently.
//! - Automation rules apply at most one action per evaluation pass per step.
//! - Reference numbers (`WF-<year>-<sequence>`) are unique under concurrent
//!   creation bursts.
//!
//! ## Module Organization
//!
//! - [`models`] - Data layer over the workflow tables
//! - [`state_machine`] - Status enums, transition table, events
//! - [`registry`] - Workflow creation and reference-number allocation
//! - [`sequencer`] - Single-active-step cascade
//! - [`resolver`] - Assignment and visibility resolution
//! - [`executor`] - The one component allowed to mutate status
//! - [`automation`] - Rule engine (immediate / event-based / time-based)
//! - [`monitor`] - Overdue scan and bulk auto-close
//! - [`web`] - Axum REST surface
//! - [`config`] / [`logging`] / [`error`] - Ambient concerns

pub mod automation;
pub mod config;
pub mod directory;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod registry;
pub mod resolver;
pub mod sequencer;
pub mod state_machine;
pub mod storage;
pub mod web;

pub use config::AuditflowConfig;
pub use error::{Result, WorkflowError};
pub use executor::{TransitionExecutor, TransitionOutcome, TransitionRequest};
pub use registry::{CreateStepInput, CreateWorkflowInput, CreatedWorkflow, WorkflowRegistry};
pub use resolver::{AssignmentResolver, StepVisibility, UserIdentity};
pub use sequencer::{AdvancePlan, AdvanceResult};
pub use state_machine::{Actor, StepEvent, StepStatus, WorkflowStatus};
