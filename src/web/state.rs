//! Shared application state for the web API.

use std::sync::Arc;

use sqlx::PgPool;

use crate::automation::AutomationEngine;
use crate::config::AuditflowConfig;
use crate::directory::Directory;
use crate::executor::TransitionExecutor;
use crate::monitor::{BulkCloser, OverdueMonitor};
use crate::registry::WorkflowRegistry;
use crate::resolver::AssignmentResolver;
use crate::storage::DocumentStore;

/// State shared across all request handlers: the pool, configuration, and
/// one instance of each engine component.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AuditflowConfig>,
    pub registry: Arc<WorkflowRegistry>,
    pub executor: Arc<TransitionExecutor>,
    pub engine: Arc<AutomationEngine>,
    pub resolver: Arc<AssignmentResolver>,
    pub monitor: Arc<OverdueMonitor>,
    pub closer: Arc<BulkCloser>,
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AuditflowConfig,
        directory: Arc<dyn Directory>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let registry = Arc::new(WorkflowRegistry::new(
            pool.clone(),
            directory,
            config.reference_alloc_retries,
        ));

        Self {
            registry,
            executor: Arc::new(TransitionExecutor::new(pool.clone())),
            engine: Arc::new(AutomationEngine::new(pool.clone())),
            resolver: Arc::new(AssignmentResolver::new(pool.clone())),
            monitor: Arc::new(OverdueMonitor::new(pool.clone())),
            closer: Arc::new(BulkCloser::new(pool.clone())),
            documents,
            config: Arc::new(config),
            pool,
        }
    }
}
