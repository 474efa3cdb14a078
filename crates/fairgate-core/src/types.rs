//! Shared tenant, tier, and request types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque tenant identifier. Every request, cache key, and queued payload
/// carries one; the isolation layers compare them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Subscription tier. Determines queue priority and the fair share of
/// instance capacity a tenant class may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Enterprise,
    Professional,
    Starter,
    Free,
}

impl Tier {
    /// All tiers in strict priority order (highest first).
    pub const ALL: [Tier; 4] = [Tier::Enterprise, Tier::Professional, Tier::Starter, Tier::Free];

    /// Queue priority; lower is dispatched first.
    pub fn priority(self) -> u8 {
        match self {
            Tier::Enterprise => 0,
            Tier::Professional => 1,
            Tier::Starter => 2,
            Tier::Free => 3,
        }
    }

    pub fn from_priority(priority: u8) -> Option<Tier> {
        match priority {
            0 => Some(Tier::Enterprise),
            1 => Some(Tier::Professional),
            2 => Some(Tier::Starter),
            3 => Some(Tier::Free),
            _ => None,
        }
    }

    /// Fair share of instance capacity, in parts per thousand. Stored as an
    /// integer so cap computations never accumulate float error.
    pub fn fair_share_permille(self) -> u32 {
        match self {
            Tier::Enterprise => 500,
            Tier::Professional => 300,
            Tier::Starter => 150,
            Tier::Free => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Enterprise => "enterprise",
            Tier::Professional => "professional",
            Tier::Starter => "starter",
            Tier::Free => "free",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tenant configuration resolved from the tenant directory. Read-only
/// inside the platform core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub tier: Tier,
    /// Sustained admission rate, requests per second.
    pub qps_limit: f64,
    /// Burst capacity of the admission token bucket.
    pub burst_qps: f64,
    /// Requests per UTC day before `quota_exhausted`.
    pub daily_quota: i64,
    pub data_residency: String,
    /// Serve retrieval snippets when the LLM circuit is open.
    pub fallback_to_search_enabled: bool,
}

/// Unique request identifier, generated at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_true() -> bool {
    true
}

/// The query body carried through admission and the queue. The embedding is
/// computed by the (external) embedding service before admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query: String,
    #[serde(default)]
    pub query_embedding: Vec<f32>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub bm25_weight: Option<f64>,
    #[serde(default)]
    pub vector_weight: Option<f64>,
    #[serde(default = "default_true")]
    pub use_llm: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl QueryPayload {
    /// A plain query with every knob left at its default.
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            query_embedding: Vec::new(),
            top_k: None,
            bm25_weight: None,
            vector_weight: None,
            use_llm: true,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// An admitted request as persisted in the queue levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    pub user_id: String,
    pub tier: Tier,
    pub submitted_at_ms: u64,
    pub deadline_at_ms: u64,
    pub payload: QueryPayload,
}

impl QueuedRequest {
    /// Global-queue ordering score: tier priority dominates, arrival time
    /// breaks ties within a tier.
    pub fn priority_score(&self) -> f64 {
        f64::from(self.tier.priority()) * 1e9 + self.submitted_at_ms as f64 / 1000.0
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_at_ms
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.deadline_at_ms.saturating_sub(now_ms))
    }
}

/// A retrieved document with its fused relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub content: String,
    pub score: f64,
    pub tenant_id: TenantId,
}

/// The completed answer handed back to the caller.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    pub answer: String,
    pub sources: Vec<ScoredDoc>,
    pub cost_dollars: f64,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Current wall-clock time as unix milliseconds.
pub fn unix_now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// The `YYYYMMDD` day stamp used in daily-quota keys.
pub fn quota_day(now_ms: u64) -> String {
    let secs = (now_ms / 1000) as i64;
    let when = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now);
    when.format("%Y%m%d").to_string()
}
