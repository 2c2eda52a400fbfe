//! Legacy key-value adapter: wraps a generic [`KvStore`] so older
//! deployments using a plain blob store can be migrated onto the façade
//! without a data migration.

use async_trait::async_trait;
use functionsdo_core::{FunctionCode, FunctionMetadata, StorageError};
use semver::Version;

use crate::facade::{CodeStore, Page, Registry, StorageResult};

/// A minimal blob store: get/put/delete on opaque string keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn kv_get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    async fn kv_put(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;
    async fn kv_delete(&self, key: &str) -> StorageResult<()>;
    async fn kv_list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Adapts any [`KvStore`] to [`Registry`] and [`CodeStore`] by namespacing
/// keys as `{tenant}/{function_id}[/{version}]/{suffix}`.
pub struct KvAdapter<K> {
    kv: K,
}

impl<K: KvStore> KvAdapter<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    fn meta_key(tenant: &str, function_id: &str) -> String {
        format!("{tenant}/{function_id}/meta")
    }

    fn meta_version_key(tenant: &str, function_id: &str, version: &Version) -> String {
        format!("{tenant}/{function_id}/meta@{version}")
    }

    fn code_key(tenant: &str, function_id: &str) -> String {
        format!("{tenant}/{function_id}/code")
    }

    fn compiled_key(tenant: &str, function_id: &str) -> String {
        format!("{tenant}/{function_id}/compiled")
    }

    fn source_map_key(tenant: &str, function_id: &str) -> String {
        format!("{tenant}/{function_id}/source_map")
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: Vec<u8>) -> StorageResult<T> {
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Backend(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Backend(e.to_string()))
}

#[async_trait]
impl<K: KvStore> Registry for KvAdapter<K> {
    async fn put(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()> {
        let key = Self::meta_key(tenant, meta.id.as_str());
        if self.kv.kv_get(&key).await?.is_some() {
            return Err(StorageError::AlreadyExists);
        }
        self.kv.kv_put(&key, encode(&meta)?).await
    }

    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionMetadata> {
        let bytes = self
            .kv
            .kv_get(&Self::meta_key(tenant, function_id))
            .await?
            .ok_or(StorageError::NotFound)?;
        decode(bytes)
    }

    async fn update(&self, tenant: &str, meta: FunctionMetadata) -> StorageResult<()> {
        let key = Self::meta_key(tenant, meta.id.as_str());
        self.kv.kv_put(&key, encode(&meta)?).await
    }

    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()> {
        self.kv.kv_delete(&Self::meta_key(tenant, function_id)).await
    }

    async fn list(
        &self,
        tenant: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StorageResult<Page<FunctionMetadata>> {
        let prefix = format!("{tenant}/");
        let mut keys = self.kv.kv_list_prefix(&prefix).await?;
        keys.retain(|k| k.ends_with("/meta"));
        keys.sort();

        let start = match cursor {
            Some(c) => keys.iter().position(|k| k == c).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };

        let mut items = Vec::new();
        for key in keys.iter().skip(start).take(limit) {
            if let Some(bytes) = self.kv.kv_get(key).await? {
                items.push(decode(bytes)?);
            }
        }
        let next_cursor = if start + items.len() < keys.len() {
            keys.get(start + items.len() - 1).cloned()
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }

    async fn put_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
        meta: FunctionMetadata,
    ) -> StorageResult<()> {
        let key = Self::meta_version_key(tenant, function_id, version);
        self.kv.kv_put(&key, encode(&meta)?).await
    }

    async fn get_version(
        &self,
        tenant: &str,
        function_id: &str,
        version: &Version,
    ) -> StorageResult<FunctionMetadata> {
        let bytes = self
            .kv
            .kv_get(&Self::meta_version_key(tenant, function_id, version))
            .await?
            .ok_or(StorageError::NotFound)?;
        decode(bytes)
    }

    async fn list_versions(&self, tenant: &str, function_id: &str) -> StorageResult<Vec<Version>> {
        let prefix = format!("{tenant}/{function_id}/meta@");
        let keys = self.kv.kv_list_prefix(&prefix).await?;
        let mut versions: Vec<Version> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        versions.sort();
        Ok(versions)
    }
}

#[async_trait]
impl<K: KvStore> CodeStore for KvAdapter<K> {
    async fn put(&self, tenant: &str, function_id: &str, code: FunctionCode) -> StorageResult<()> {
        self.kv
            .kv_put(&Self::code_key(tenant, function_id), encode(&code)?)
            .await
    }

    async fn get(&self, tenant: &str, function_id: &str) -> StorageResult<FunctionCode> {
        let bytes = self
            .kv
            .kv_get(&Self::code_key(tenant, function_id))
            .await?
            .ok_or(StorageError::NotFound)?;
        decode(bytes)
    }

    async fn delete(&self, tenant: &str, function_id: &str) -> StorageResult<()> {
        self.kv.kv_delete(&Self::code_key(tenant, function_id)).await
    }

    async fn put_compiled(
        &self,
        tenant: &str,
        function_id: &str,
        compiled: String,
    ) -> StorageResult<()> {
        self.kv
            .kv_put(&Self::compiled_key(tenant, function_id), compiled.into_bytes())
            .await
    }

    async fn get_compiled(&self, tenant: &str, function_id: &str) -> StorageResult<String> {
        let bytes = self
            .kv
            .kv_get(&Self::compiled_key(tenant, function_id))
            .await?
            .ok_or(StorageError::NotFound)?;
        String::from_utf8(bytes).map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn put_source_map(
        &self,
        tenant: &str,
        function_id: &str,
        source_map: String,
    ) -> StorageResult<()> {
        self.kv
            .kv_put(&Self::source_map_key(tenant, function_id), source_map.into_bytes())
            .await
    }

    async fn get_source_map(&self, tenant: &str, function_id: &str) -> StorageResult<String> {
        let bytes = self
            .kv
            .kv_get(&Self::source_map_key(tenant, function_id))
            .await?
            .ok_or(StorageError::NotFound)?;
        String::from_utf8(bytes).map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn list_versions(&self, _tenant: &str, _function_id: &str) -> StorageResult<Vec<Version>> {
        Ok(vec![])
    }
}
