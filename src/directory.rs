//! Existence checks against the external audit/user/department CRUD
//! services. The engine only ever asks "does this id resolve"; everything
//! else about those records is someone else's concern.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn audit_exists(&self, id: i64) -> Result<bool>;
    async fn user_exists(&self, id: i64) -> Result<bool>;
    async fn department_exists(&self, id: i64) -> Result<bool>;
}

/// Directory backed by the collaborator-owned lookup tables
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, table: &str, id: i64) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar::<_, bool>(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn audit_exists(&self, id: i64) -> Result<bool> {
        self.exists("audits", id).await
    }

    async fn user_exists(&self, id: i64) -> Result<bool> {
        self.exists("users", id).await
    }

    async fn department_exists(&self, id: i64) -> Result<bool> {
        self.exists("departments", id).await
    }
}

/// In-memory directory for tests and standalone development setups
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    pub audits: std::collections::HashSet<i64>,
    pub users: std::collections::HashSet<i64>,
    pub departments: std::collections::HashSet<i64>,
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn audit_exists(&self, id: i64) -> Result<bool> {
        Ok(self.audits.contains(&id))
    }

    async fn user_exists(&self, id: i64) -> Result<bool> {
        Ok(self.users.contains(&id))
    }

    async fn department_exists(&self, id: i64) -> Result<bool> {
        Ok(self.departments.contains(&id))
    }
}

/// Directory that answers yes to everything; for setups where the
/// collaborator services are not wired up.
#[derive(Debug, Clone, Copy)]
pub struct PermissiveDirectory;

#[async_trait]
impl Directory for PermissiveDirectory {
    async fn audit_exists(&self, _id: i64) -> Result<bool> {
        Ok(true)
    }

    async fn user_exists(&self, _id: i64) -> Result<bool> {
        Ok(true)
    }

    async fn department_exists(&self, _id: i64) -> Result<bool> {
        Ok(true)
    }
}
