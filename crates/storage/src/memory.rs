//! In-memory storage adapter — the default for local/dev and the backend
//! used by the gateway's integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use functionsdo_core::{FunctionCode, FunctionMetadata, StorageError};
use semver::Version;
use tokio::sync::RwLock;

use crate::facade::{ApiKeyStore, CodeStore, Page, Registry, StorageResult};

#[derive(Default)]
struct TenantData {
    current: HashMap<String, FunctionMetadata>,
    versions: HashMap<String, HashMap<Version, FunctionMetadata>>,
    code: HashMap<String, FunctionCode>,
    code_versions: HashMap<String, HashMap<Version, FunctionCode>>,
}

/// A process-local, non-persistent storage backend keyed by tenant id.
pub struct MemoryStorage {
    tenants: RwLock<HashMap<String, TenantData>>,
    api_keys: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            api_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register an API key → owning-user mapping, for tests and local setup.
    pub async fn register_api_key(&self, api_key: impl Into<String>, user_id: impl Into<String>) {
        self.api_keys.write().await.insert(api_key.into(), user_id.into());
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MemoryStorage {
    async fn put(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        if data.current.contains_key(meta.id.as_str()) {
            return Err(StorageError::AlreadyExists);
        }
        data.current.insert(meta.id.as_str().to_string(), meta);
        Ok(())
    }

    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionMetadata> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant)
            .and_then(|d| d.current.get(function_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn update(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        data.current.insert(meta.id.as_str().to_string(), meta);
        Ok(())
    }

    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        data.current.remove(function_id).ok_or(StorageError::NotFound)?;
        Ok(())
    }

    async fn list(
        &self,
        tenant: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StorageResult<Page<FunctionMetadata>> {
        let tenants = self.tenants.read().await;
        let Some(data) = tenants.get(tenant) else {
            return Ok(Page { items: vec![], next_cursor: None });
        };
        let mut ids: Vec<&String> = data.current.keys().collect();
        ids.sort();
        let start = match cursor {
            Some(c) => ids.iter().position(|id| id.as_str() == c).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        let page: Vec<FunctionMetadata> = ids
            .iter()
            .skip(start)
            .take(limit)
            .filter_map(|id| data.current.get(id.as_str()).cloned())
            .collect();
        let next_cursor = if start + page.len() < ids.len() {
            page.last().map(|m| m.id.as_str().to_string())
        } else {
            None
        };
        Ok(Page { items: page, next_cursor })
    }

    async fn put_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
        meta: FunctionMetadata,
    ) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        data.versions
            .entry(function_id.to_string())
            .or_default()
            .insert(version.clone(), meta);
        Ok(())
    }

    async fn get_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
    ) -> StorageResult<FunctionMetadata> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant)
            .and_then(|d| d.versions.get(function_id))
            .and_then(|v| v.get(version))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_versions(&self, tenant: &str, function_id: &str) -> StorageResult<Vec<Version>> {
        let tenants = self.tenants.read().await;
        let mut versions: Vec<Version> = tenants
            .get(tenant)
            .and_then(|d| d.versions.get(function_id))
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        versions.sort();
        Ok(versions)
    }
}

#[async_trait]
impl CodeStore for MemoryStorage {
    async fn put(&self, tenant: &str, function_id: &str, code: FunctionCode) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        data.code.insert(function_id.to_string(), code);
        Ok(())
    }

    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionCode> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant)
            .and_then(|d| d.code.get(function_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        data.code.remove(function_id).ok_or(StorageError::NotFound)?;
        Ok(())
    }

    async fn put_compiled(
        &self,
        tenant: &str,
        function_id: &str,
        compiled: String,
    ) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        let entry = data.code.get_mut(function_id).ok_or(StorageError::NotFound)?;
        entry.compiled = Some(compiled);
        Ok(())
    }

    async fn get_compiled(&self, tenant: &str, function_id: &str) -> StorageResult<String> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant)
            .and_then(|d| d.code.get(function_id))
            .and_then(|c| c.compiled.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn put_source_map(
        &self,
        tenant: &str,
        function_id: &str,
        source_map: String,
    ) -> StorageResult<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(tenant.to_string()).or_default();
        let entry = data.code.get_mut(function_id).ok_or(StorageError::NotFound)?;
        entry.source_map = Some(source_map);
        Ok(())
    }

    async fn get_source_map(&self, tenant: &str, function_id: &str) -> StorageResult<String> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant)
            .and_then(|d| d.code.get(function_id))
            .and_then(|c| c.source_map.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_versions(&self, tenant: &str, function_id: &str) -> StorageResult<Vec<Version>> {
        let tenants = self.tenants.read().await;
        let mut versions: Vec<Version> = tenants
            .get(tenant)
            .and_then(|d| d.code_versions.get(function_id))
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        versions.sort();
        Ok(versions)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStorage {
    async fn resolve(&self, api_key: &str) -> StorageResult<Option<String>> {
        Ok(self.api_keys.read().await.get(api_key).cloned())
    }
}
