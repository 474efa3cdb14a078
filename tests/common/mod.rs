//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use fairgate_core::{
    AuditRecord, AuditSink, Completion, CostEvent, DependencyError, LlmClient, QueryPayload,
    RetrievalBackend, ScoredDoc, SecurityEvent, SecurityKind, TenantConfig, TenantDirectory,
    TenantId, Tier,
};
use fairgate_admission::AdmissionRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Routes component tracing through the test harness's captured output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Fixed set of tenants.
pub struct StaticTenants(pub Vec<TenantConfig>);

#[async_trait]
impl TenantDirectory for StaticTenants {
    async fn get_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<TenantConfig>, DependencyError> {
        Ok(self.0.iter().find(|t| &t.tenant_id == tenant_id).cloned())
    }
}

pub fn tenant(id: &str, tier: Tier) -> TenantConfig {
    TenantConfig {
        tenant_id: TenantId::from(id),
        tier,
        qps_limit: 1000.0,
        burst_qps: 1000.0,
        daily_quota: 1_000_000,
        data_residency: "us".to_string(),
        fallback_to_search_enabled: false,
    }
}

pub fn admission_request(tenant_id: &str, query: &str) -> AdmissionRequest {
    AdmissionRequest {
        tenant_id: TenantId::from(tenant_id),
        user_id: "u1".to_string(),
        payload: QueryPayload {
            query_embedding: vec![0.5, 0.5],
            ..QueryPayload::text(query)
        },
    }
}

pub fn doc(id: &str, tenant: &str, score: f64) -> ScoredDoc {
    ScoredDoc {
        doc_id: id.to_string(),
        content: format!("content of {id}"),
        score,
        tenant_id: TenantId::from(tenant),
    }
}

/// Retrieval double returning fixed result sets, with optional latency.
pub struct ScriptedRetrieval {
    pub bm25: Vec<ScoredDoc>,
    pub vector: Vec<ScoredDoc>,
    pub latency: Duration,
}

impl ScriptedRetrieval {
    pub fn with_docs(bm25: Vec<ScoredDoc>, vector: Vec<ScoredDoc>) -> Self {
        Self {
            bm25,
            vector,
            latency: Duration::ZERO,
        }
    }

    pub fn empty() -> Self {
        Self::with_docs(Vec::new(), Vec::new())
    }
}

#[async_trait]
impl RetrievalBackend for ScriptedRetrieval {
    async fn bm25(
        &self,
        _tenant_id: &TenantId,
        _query: &str,
    ) -> Result<Vec<ScoredDoc>, DependencyError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.bm25.clone())
    }

    async fn vector(
        &self,
        _tenant_id: &TenantId,
        _embedding: &[f32],
    ) -> Result<Vec<ScoredDoc>, DependencyError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.vector.clone())
    }
}

/// LLM double: counts calls, optionally sleeps, and fails the first
/// `fail_first` calls with a transient error.
pub struct ScriptedLlm {
    pub calls: AtomicUsize,
    pub latency: Duration,
    pub fail_first: usize,
}

impl ScriptedLlm {
    pub fn answering() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
            fail_first: 0,
        }
    }

    pub fn slow(latency: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency,
            fail_first: 0,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _tenant_id: &TenantId,
        prompt: &str,
        _deadline: Duration,
    ) -> Result<Completion, DependencyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if call < self.fail_first {
            return Err(DependencyError::Transient("upstream hiccup".to_string()));
        }
        Ok(Completion {
            text: format!("answer derived from {} context bytes", prompt.len()),
            tokens_used: 64,
        })
    }
}

/// Audit sink that records everything for assertions.
#[derive(Default)]
pub struct CollectingSink {
    pub costs: Mutex<Vec<CostEvent>>,
    pub security: Mutex<Vec<SecurityEvent>>,
    pub audits: Mutex<Vec<AuditRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn security_count(&self, kind: SecurityKind) -> usize {
        self.security
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl AuditSink for CollectingSink {
    fn cost(&self, event: CostEvent) {
        self.costs.lock().unwrap().push(event);
    }

    fn security(&self, event: SecurityEvent) {
        self.security.lock().unwrap().push(event);
    }

    fn audit(&self, record: AuditRecord) {
        self.audits.lock().unwrap().push(record);
    }
}
