use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone)]
pub struct AuditflowConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_address: String,
    pub document_root: String,
    pub document_public_base: String,
    pub sweep_interval_secs: u64,
    pub reference_alloc_retries: u32,
    pub request_timeout_ms: u64,
}

impl Default for AuditflowConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/auditflow_development".to_string(),
            max_connections: 10,
            bind_address: "0.0.0.0:8080".to_string(),
            document_root: "storage/documents".to_string(),
            document_public_base: "/files".to_string(),
            sweep_interval_secs: 300,
            reference_alloc_retries: 3,
            request_timeout_ms: 30_000,
        }
    }
}

impl AuditflowConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(max_connections) = std::env::var("AUDITFLOW_MAX_CONNECTIONS") {
            config.max_connections = max_connections.parse().map_err(|e| {
                WorkflowError::Configuration(format!("Invalid max_connections: {e}"))
            })?;
        }

        if let Ok(bind) = std::env::var("AUDITFLOW_BIND_ADDRESS") {
            config.bind_address = bind;
        }

        if let Ok(root) = std::env::var("AUDITFLOW_DOCUMENT_ROOT") {
            config.document_root = root;
        }

        if let Ok(base) = std::env::var("AUDITFLOW_DOCUMENT_PUBLIC_BASE") {
            config.document_public_base = base;
        }

        if let Ok(interval) = std::env::var("AUDITFLOW_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = interval.parse().map_err(|e| {
                WorkflowError::Configuration(format!("Invalid sweep_interval_secs: {e}"))
            })?;
        }

        if let Ok(retries) = std::env::var("AUDITFLOW_REFERENCE_ALLOC_RETRIES") {
            config.reference_alloc_retries = retries.parse().map_err(|e| {
                WorkflowError::Configuration(format!("Invalid reference_alloc_retries: {e}"))
            })?;
        }

        Ok(config)
    }
}
