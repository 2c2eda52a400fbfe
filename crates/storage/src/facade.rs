//! The per-tenant storage façade: three collaborators behind one resolver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use functionsdo_core::{FunctionCode, FunctionMetadata, RollbackRecord, StorageError};
use semver::Version;

pub type StorageResult<T> = Result<T, StorageError>;

/// A page of listed items plus an opaque cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Function metadata collaborator.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn put(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()>;
    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionMetadata>;
    async fn update(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()>;
    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()>;
    async fn list(
        &self,
        tenant: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StorageResult<Page<FunctionMetadata>>;
    async fn put_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
        meta: FunctionMetadata,
    ) -> StorageResult<()>;
    async fn get_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
    ) -> StorageResult<FunctionMetadata>;
    async fn list_versions(&self, tenant: &str, function_id: &str) -> StorageResult<Vec<Version>>;

    /// Roll the current pointer back (or forward) to `version`, recording the
    /// transition in history. Semantics: set current = requested (no ordering
    /// check beyond existence of the target version).
    async fn rollback(
        &self,
        tenant: &str,
        function_id: &str,
        to: &Version,
        at: DateTime<Utc>,
    ) -> StorageResult<RollbackRecord> {
        let current = self.get(tenant, function_id).await.ok();
        let target = self.get_version(tenant, function_id, to).await?;
        self.update(tenant, target).await?;
        Ok(RollbackRecord {
            from: current.map(|m| m.version),
            to: to.clone(),
            at,
        })
    }
}

/// Function source/compiled-artifact collaborator.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn put(&self, tenant: &str, function_id: &str, code: FunctionCode) -> StorageResult<()>;
    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionCode>;
    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()>;
    async fn put_compiled(
        &self,
        tenant: &str,
        function_id: &str,
        compiled: String,
    ) -> StorageResult<()>;
    async fn get_compiled(&self, tenant: &str, function_id: &str) -> StorageResult<String>;
    async fn put_source_map(
        &self,
        tenant: &str,
        function_id: &str,
        source_map: String,
    ) -> StorageResult<()>;
    async fn get_source_map(&self, tenant: &str, function_id: &str) -> StorageResult<String>;
    async fn list_versions(&self, tenant: &str, function_id: &str) -> StorageResult<Vec<Version>>;
}

/// Optional API key verification collaborator.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Resolve an API key to the tenant/user id that owns it, or `None`.
    async fn resolve(&self, api_key: &str) -> StorageResult<Option<String>>;
}

/// Per-user coordinator: the registry/code/apiKeys triple scoped to one
/// authenticated user, handed out by [`StorageFacade::coordinator_for`].
pub struct Coordinator {
    pub registry: Arc<dyn Registry>,
    pub code: Arc<dyn CodeStore>,
    pub api_keys: Option<Arc<dyn ApiKeyStore>>,
}

/// Resolves storage coordinators per authenticated user id.
///
/// Resolution rule: if a per-user coordinator is configured and the request
/// carries an authenticated user id, use it; otherwise fall back to the
/// default coordinator, or fail with [`StorageError::NotConfigured`].
#[derive(Default)]
pub struct StorageFacade {
    coordinators: HashMap<String, Coordinator>,
    default: Option<Coordinator>,
}

impl StorageFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, coordinator: Coordinator) -> Self {
        self.default = Some(coordinator);
        self
    }

    pub fn with_user_coordinator(mut self, user_id: impl Into<String>, coordinator: Coordinator) -> Self {
        self.coordinators.insert(user_id.into(), coordinator);
        self
    }

    pub fn coordinator_for(&self, user_id: Option<&str>) -> StorageResult<&Coordinator> {
        if let Some(user_id) = user_id {
            if let Some(c) = self.coordinators.get(user_id) {
                return Ok(c);
            }
        }
        self.default.as_ref().ok_or(StorageError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn coordinator() -> Coordinator {
        let mem = Arc::new(MemoryStorage::new());
        Coordinator {
            registry: mem.clone(),
            code: mem,
            api_keys: None,
        }
    }

    #[test]
    fn unconfigured_facade_fails_closed() {
        let facade = StorageFacade::new();
        let result = facade.coordinator_for(Some("user-1"));
        assert!(matches!(result, Err(StorageError::NotConfigured)));
    }

    #[test]
    fn per_user_coordinator_takes_priority_over_default() {
        let facade = StorageFacade::new()
            .with_default(coordinator())
            .with_user_coordinator("user-1", coordinator());
        assert!(facade.coordinator_for(Some("user-1")).is_ok());
        assert!(facade.coordinator_for(Some("user-2")).is_ok());
        assert!(facade.coordinator_for(None).is_ok());
    }
}
