//! Tenant-scoped cache over the shared key-value store.

use crate::key::tenant_key;
use fairgate_core::{DependencyError, KvStore, TenantId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the tenant cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: String::from("genai:cache:"),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

/// Cache whose API makes tenant-unscoped keys unrepresentable: every
/// operation takes the tenant, and the stored key is always
/// `<namespace><tenant>:<suffix>` (the suffix digested when the combined
/// `tenant:suffix` form runs past the length cap).
pub struct TenantCache {
    kv: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl TenantCache {
    pub fn new(config: CacheConfig, kv: Arc<dyn KvStore>) -> Self {
        Self { kv, config }
    }

    /// The full store key an entry lives under. Exposed so isolation tests
    /// can prove the prefix discipline by attempted collision.
    pub fn key_for(&self, tenant_id: &TenantId, suffix: &str) -> String {
        format!("{}{}", self.config.namespace, tenant_key(tenant_id, suffix))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        tenant_id: &TenantId,
        suffix: &str,
    ) -> Result<Option<T>, DependencyError> {
        let key = self.key_for(tenant_id, suffix);
        match self.kv.get(&key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::trace!(tenant_id = %tenant_id, key = %key, "cache hit");
                    Ok(Some(value))
                }
                Err(error) => {
                    // A corrupt entry behaves like a miss.
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        key = %key,
                        error = %error,
                        "dropping undecodable cache entry"
                    );
                    let _ = self.kv.delete(&key).await;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        tenant_id: &TenantId,
        suffix: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), DependencyError> {
        let key = self.key_for(tenant_id, suffix);
        let raw = serde_json::to_string(value)
            .map_err(|error| DependencyError::Permanent(format!("cache encode failed: {error}")))?;
        self.kv
            .set_with_ttl(&key, raw, ttl.unwrap_or(self.config.default_ttl))
            .await
    }

    pub async fn delete(&self, tenant_id: &TenantId, suffix: &str) -> Result<bool, DependencyError> {
        let key = self.key_for(tenant_id, suffix);
        self.kv.delete(&key).await
    }

    /// Deletes every cache entry under the tenant's prefix. Returns how
    /// many were removed.
    pub async fn clear_tenant(&self, tenant_id: &TenantId) -> Result<usize, DependencyError> {
        let prefix = format!("{}{}:", self.config.namespace, tenant_id);
        let keys = self.kv.scan_prefix(&prefix).await?;
        let mut removed = 0;
        for key in keys {
            if self.kv.delete(&key).await? {
                removed += 1;
            }
        }
        tracing::info!(tenant_id = %tenant_id, count = removed, "tenant cache cleared");
        Ok(removed)
    }
}
