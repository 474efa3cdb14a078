//! Adapter interfaces for the platform's external collaborators.
//!
//! The core never talks to a wire protocol directly: tenant lookup,
//! retrieval, LLM inference, the shared key-value store, and the
//! audit/metrics sink all sit behind these traits. Production
//! implementations live outside the core; test doubles implement the same
//! interfaces.

use crate::error::DependencyError;
use crate::types::{RequestId, ScoredDoc, TenantConfig, TenantId};
use async_trait::async_trait;
use std::time::Duration;

/// Source of per-tenant configuration.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Resolves a tenant; `None` means the tenant is unknown and the
    /// request is rejected as unauthenticated.
    async fn get_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<TenantConfig>, DependencyError>;
}

/// Lexical and semantic retrieval backends. Both methods must only ever
/// return documents tagged with the given tenant; the pipeline verifies
/// this regardless.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn bm25(
        &self,
        tenant_id: &TenantId,
        query: &str,
    ) -> Result<Vec<ScoredDoc>, DependencyError>;

    async fn vector(
        &self,
        tenant_id: &TenantId,
        embedding: &[f32],
    ) -> Result<Vec<ScoredDoc>, DependencyError>;
}

/// A completed LLM inference.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

/// LLM inference client. Implementations classify their wire errors as
/// transient or permanent through [`DependencyError`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        tenant_id: &TenantId,
        prompt: &str,
        deadline: Duration,
    ) -> Result<Completion, DependencyError>;
}

/// Atomic operations against the shared key-value store. The queue levels,
/// daily quota counters, and tenant cache all persist here.
///
/// `zset_pop_min` and `zset_pop_min_in_range` must be atomic (ZPOPMIN or a
/// bounded equivalent): pop-then-remove sequences would double-dispatch
/// under concurrent consumers.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn list_push_back(&self, key: &str, value: String) -> Result<(), DependencyError>;
    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, DependencyError>;
    async fn list_front(&self, key: &str) -> Result<Option<String>, DependencyError>;
    async fn list_len(&self, key: &str) -> Result<usize, DependencyError>;
    async fn list_range(&self, key: &str) -> Result<Vec<String>, DependencyError>;
    /// Removes the first occurrence of `value`; returns whether it was found.
    async fn list_remove(&self, key: &str, value: &str) -> Result<bool, DependencyError>;

    async fn zset_add(&self, key: &str, member: String, score: f64)
        -> Result<(), DependencyError>;
    async fn zset_pop_min(&self, key: &str) -> Result<Option<String>, DependencyError>;
    /// Atomically pops the minimum-score member with `min <= score < max`.
    async fn zset_pop_min_in_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Option<String>, DependencyError>;
    async fn zset_len(&self, key: &str) -> Result<usize, DependencyError>;
    /// All members in ascending score order.
    async fn zset_members(&self, key: &str) -> Result<Vec<String>, DependencyError>;
    async fn zset_remove(&self, key: &str, member: &str) -> Result<bool, DependencyError>;

    /// Atomically increments a counter, setting `ttl` when the key is
    /// created. Returns the post-increment value.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, DependencyError>;

    async fn get(&self, key: &str) -> Result<Option<String>, DependencyError>;
    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), DependencyError>;
    async fn delete(&self, key: &str) -> Result<bool, DependencyError>;
    /// All live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, DependencyError>;
}

/// What a cost event was charged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostKind {
    Compute,
    LlmTokens,
    Retrieval,
}

impl CostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CostKind::Compute => "compute",
            CostKind::LlmTokens => "llm_tokens",
            CostKind::Retrieval => "retrieval",
        }
    }
}

/// Append-only billing record emitted on every dispatch completion.
#[derive(Debug, Clone)]
pub struct CostEvent {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub kind: CostKind,
    pub amount_dollars: f64,
    pub ts_ms: u64,
}

/// Category of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityKind {
    PromptInjection,
    CrossTenantLeakage,
    NoisyNeighbor,
    QueryScraping,
    MassExport,
}

impl SecurityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityKind::PromptInjection => "prompt_injection",
            SecurityKind::CrossTenantLeakage => "cross_tenant_leakage",
            SecurityKind::NoisyNeighbor => "noisy_neighbor",
            SecurityKind::QueryScraping => "query_scraping",
            SecurityKind::MassExport => "mass_export",
        }
    }
}

/// A security-relevant observation. Never masked, never retried.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub tenant_id: TenantId,
    pub kind: SecurityKind,
    pub detail: String,
    /// Anomaly score in `[0, 100]` where the detector produces one.
    pub anomaly_score: Option<f64>,
    pub ts_ms: u64,
}

/// A request-lifecycle audit record.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    pub user_id: String,
    pub request_id: Option<RequestId>,
    pub action: String,
    pub status: String,
    pub ts_ms: u64,
}

/// Fire-and-forget ingestion of audit, cost, and security events.
/// Implementations must not block the caller; buffering and shipping are
/// their concern.
pub trait AuditSink: Send + Sync {
    fn cost(&self, event: CostEvent);
    fn security(&self, event: SecurityEvent);
    fn audit(&self, record: AuditRecord);
}

/// An audit sink that discards everything. Useful as a default and in
/// tests that do not observe events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn cost(&self, _event: CostEvent) {}
    fn security(&self, _event: SecurityEvent) {}
    fn audit(&self, _record: AuditRecord) {}
}
