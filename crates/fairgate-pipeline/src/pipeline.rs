//! The RAG pipeline orchestrator.

use crate::behavior::{BehaviorFlag, BehaviorTracker};
use crate::config::PipelineConfig;
use crate::events::PipelineEvent;
use crate::fusion::{fuse, FusionWeights};
use crate::isolation::{check_tenant_isolation, IsolationViolation};
use crate::redact::PiiRedactor;
use fairgate_cache::TenantCache;
use fairgate_core::{
    quota_day, unix_now_ms, AuditRecord, AuditSink, CostEvent, CostKind, DependencyError,
    ErrorKind, LlmClient, ProcessFailure, QueryOutcome, QueuedRequest, RetrievalBackend,
    ScoredDoc, SecurityEvent, TenantDirectory, TenantId,
};
use fairgate_resilience::{CircuitBreaker, Resilient, RetryPolicy};
use futures::future::Either;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found for your query.";

/// Terminal pipeline failures, mapped onto the caller-visible taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    CrossTenantLeakage(#[from] IsolationViolation),

    /// The LLM circuit is open and the tenant has no search fallback.
    #[error("llm unavailable: {0}")]
    LlmUnavailable(DependencyError),

    /// The tenant disappeared between admission and dispatch.
    #[error("tenant configuration is no longer available")]
    UnknownTenant,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Dependency(DependencyError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::CrossTenantLeakage(_) => ErrorKind::CrossTenantLeakage,
            PipelineError::LlmUnavailable(_) => ErrorKind::CircuitOpen,
            PipelineError::UnknownTenant => ErrorKind::PermanentDependency,
            PipelineError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            PipelineError::Dependency(err) => err.kind(),
        }
    }

    pub fn into_failure(self) -> ProcessFailure {
        let message = self.to_string();
        ProcessFailure::new(self.kind(), message)
    }
}

/// The resilience guards for each pipeline dependency.
pub struct PipelineGuards {
    pub bm25: Resilient,
    pub vector: Resilient,
    pub llm: Resilient,
}

impl PipelineGuards {
    /// Default guards: 5 consecutive failures open a tenant's circuit for
    /// 60 s; up to 3 attempts with exponential backoff.
    pub fn standard() -> Self {
        let retry = || {
            RetryPolicy::builder()
                .max_attempts(3)
                .exponential_backoff(std::time::Duration::from_secs(1))
                .max_wait(std::time::Duration::from_secs(10))
        };
        Self {
            bm25: Resilient::new(
                Arc::new(CircuitBreaker::builder().name("bm25_search").build()),
                retry().name("bm25_search").build(),
            ),
            vector: Resilient::new(
                Arc::new(CircuitBreaker::builder().name("vector_store").build()),
                retry().name("vector_store").build(),
            ),
            llm: Resilient::new(
                Arc::new(CircuitBreaker::builder().name("llm_service").build()),
                retry().name("llm_service").build(),
            ),
        }
    }
}

/// Orchestrates one dispatched request: hybrid retrieval, isolation check,
/// redaction, LLM call, citations, and the accounting hooks that ride on
/// every step.
pub struct RagPipeline {
    tenants: Arc<dyn TenantDirectory>,
    retrieval: Arc<dyn RetrievalBackend>,
    llm: Arc<dyn LlmClient>,
    cache: TenantCache,
    audit: Arc<dyn AuditSink>,
    guards: PipelineGuards,
    redactor: PiiRedactor,
    behavior: BehaviorTracker,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        config: PipelineConfig,
        guards: PipelineGuards,
        tenants: Arc<dyn TenantDirectory>,
        retrieval: Arc<dyn RetrievalBackend>,
        llm: Arc<dyn LlmClient>,
        cache: TenantCache,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let behavior = BehaviorTracker::new(config.behavior.clone());
        Self {
            tenants,
            retrieval,
            llm,
            cache,
            audit,
            guards,
            redactor: PiiRedactor::new(),
            behavior,
            config,
        }
    }

    /// The guards, exposed for composition and tests.
    pub fn guards(&self) -> &PipelineGuards {
        &self.guards
    }

    pub async fn execute(
        &self,
        request: &QueuedRequest,
        deadline: Instant,
    ) -> Result<QueryOutcome, PipelineError> {
        let started = Instant::now();
        let tenant_id = &request.tenant_id;
        let payload = &request.payload;

        self.audit_status(request, "started");
        tracing::info!(
            request_id = %request.request_id,
            tenant_id = %tenant_id,
            "rag generation started"
        );

        if let Some(flag) = self
            .behavior
            .observe_query(tenant_id, &request.user_id, &payload.query)
        {
            self.raise_behavior_flag(tenant_id, flag);
        }

        let tenant = self
            .tenants
            .get_tenant(tenant_id)
            .await
            .map_err(PipelineError::Dependency)?
            .ok_or(PipelineError::UnknownTenant)?;

        let docs = self.retrieve(request, deadline).await;
        let mut cost_dollars = self.config.retrieval_cost_per_query;
        self.audit.cost(CostEvent {
            tenant_id: tenant_id.clone(),
            request_id: request.request_id.clone(),
            kind: CostKind::Retrieval,
            amount_dollars: self.config.retrieval_cost_per_query,
            ts_ms: unix_now_ms(),
        });

        if docs.is_empty() {
            self.config.event_listeners.emit(&PipelineEvent::NoDocuments {
                tenant_id: tenant_id.clone(),
                timestamp: std::time::Instant::now(),
            });
            self.audit_status(request, "no_docs");
            tracing::warn!(
                request_id = %request.request_id,
                tenant_id = %tenant_id,
                "no documents retrieved"
            );
            return Ok(self.outcome(
                request,
                NO_DOCUMENTS_ANSWER.to_string(),
                Vec::new(),
                cost_dollars,
                0,
                started,
            ));
        }

        if let Err(violation) = check_tenant_isolation(&docs, tenant_id) {
            self.block_leakage(request, &violation);
            return Err(PipelineError::CrossTenantLeakage(violation));
        }

        if let Some(flag) = self.behavior.observe_export(
            tenant_id,
            &request.user_id,
            docs.len(),
            &quota_day(unix_now_ms()),
        ) {
            self.raise_behavior_flag(tenant_id, flag);
        }

        let context = docs
            .iter()
            .map(|doc| format!("[{}] {}", doc.doc_id, doc.content))
            .collect::<Vec<_>>()
            .join("\n");
        let context = self.maybe_redact(context);

        if !payload.use_llm {
            let answer = with_citations(&context, &docs);
            self.audit_status(request, "completed");
            return Ok(self.outcome(request, answer, docs, cost_dollars, 0, started));
        }

        let prompt = format!(
            "Based on the following documents, answer the user's question.\n\n\
             Documents:\n{context}\n\nQuestion: {query}\n\nAnswer:",
            query = payload.query
        );

        let llm_result = self
            .guards
            .llm
            .call(tenant_id, deadline, || {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.llm.complete(tenant_id, &prompt, remaining)
            })
            .await;

        match llm_result {
            Ok(completion) => {
                let tokens = completion.tokens_used;
                let llm_cost = tokens as f64 / 1000.0 * self.config.llm_cost_per_1k_tokens;
                cost_dollars += llm_cost;
                self.audit.cost(CostEvent {
                    tenant_id: tenant_id.clone(),
                    request_id: request.request_id.clone(),
                    kind: CostKind::LlmTokens,
                    amount_dollars: llm_cost,
                    ts_ms: unix_now_ms(),
                });
                self.config.event_listeners.emit(&PipelineEvent::LlmCompleted {
                    tenant_id: tenant_id.clone(),
                    tokens_used: tokens,
                    timestamp: std::time::Instant::now(),
                });

                let answer = with_citations(&self.maybe_redact(completion.text), &docs);
                self.audit_status(request, "completed");
                Ok(self.outcome(request, answer, docs, cost_dollars, tokens, started))
            }
            Err(DependencyError::CircuitOpen) if tenant.fallback_to_search_enabled => {
                self.config.event_listeners.emit(&PipelineEvent::FallbackServed {
                    tenant_id: tenant_id.clone(),
                    timestamp: std::time::Instant::now(),
                });
                tracing::warn!(
                    request_id = %request.request_id,
                    tenant_id = %tenant_id,
                    "llm circuit open; serving retrieval snippets"
                );
                let answer = format!(
                    "Generation is temporarily unavailable; closest matching excerpts:\n\n{}",
                    with_citations(&context, &docs)
                );
                self.audit_status(request, "fallback");
                Ok(self.outcome(request, answer, docs, cost_dollars, 0, started))
            }
            Err(DependencyError::CircuitOpen) => {
                self.audit_status(request, "failed");
                Err(PipelineError::LlmUnavailable(DependencyError::CircuitOpen))
            }
            Err(DependencyError::DeadlineExceeded) => {
                self.audit_status(request, "failed");
                Err(PipelineError::DeadlineExceeded)
            }
            Err(err) => {
                self.audit_status(request, "failed");
                Err(PipelineError::Dependency(err))
            }
        }
    }

    /// Hybrid retrieval: both sides fan out concurrently; the first result
    /// grants the slower side a patience window before abandoning it. A
    /// failed side degrades to an empty list.
    async fn retrieve(&self, request: &QueuedRequest, deadline: Instant) -> Vec<ScoredDoc> {
        let tenant_id = &request.tenant_id;
        let payload = &request.payload;

        let bm25_fut = Box::pin(self.bm25_side(tenant_id, &payload.query, deadline));
        let vector_fut = Box::pin(self.vector_side(tenant_id, &payload.query_embedding, deadline));

        let (bm25_docs, vector_docs) = match futures::future::select(bm25_fut, vector_fut).await {
            Either::Left((bm25, vector_rest)) => {
                let vector = match tokio::time::timeout(self.config.patience, vector_rest).await {
                    Ok(docs) => docs,
                    Err(_) => {
                        self.abandon_side("vector");
                        Vec::new()
                    }
                };
                (bm25, vector)
            }
            Either::Right((vector, bm25_rest)) => {
                let bm25 = match tokio::time::timeout(self.config.patience, bm25_rest).await {
                    Ok(docs) => docs,
                    Err(_) => {
                        self.abandon_side("bm25");
                        Vec::new()
                    }
                };
                (bm25, vector)
            }
        };

        let weights = FusionWeights {
            bm25: payload.bm25_weight.unwrap_or(self.config.bm25_weight),
            vector: payload.vector_weight.unwrap_or(self.config.vector_weight),
        };
        let top_k = payload.top_k.unwrap_or(self.config.top_k);
        let fused = fuse(
            bm25_docs,
            vector_docs,
            weights,
            self.config.min_score,
            top_k,
        );

        self.config
            .event_listeners
            .emit(&PipelineEvent::RetrievalCompleted {
                tenant_id: tenant_id.clone(),
                documents: fused.len(),
                timestamp: std::time::Instant::now(),
            });

        #[cfg(feature = "metrics")]
        metrics::histogram!("fairgate_retrieval_documents").record(fused.len() as f64);

        fused
    }

    async fn bm25_side(
        &self,
        tenant_id: &TenantId,
        query: &str,
        deadline: Instant,
    ) -> Vec<ScoredDoc> {
        let suffix = format!("bm25:{query}");
        if let Some(docs) = self.cached_side(tenant_id, &suffix).await {
            return docs;
        }

        let result = self
            .guards
            .bm25
            .call(tenant_id, deadline, || self.retrieval.bm25(tenant_id, query))
            .await;
        self.finish_side(tenant_id, "bm25", &suffix, result).await
    }

    async fn vector_side(
        &self,
        tenant_id: &TenantId,
        embedding: &[f32],
        deadline: Instant,
    ) -> Vec<ScoredDoc> {
        if embedding.is_empty() {
            return Vec::new();
        }
        let suffix = format!("vector:{}", embedding_digest(embedding));
        if let Some(docs) = self.cached_side(tenant_id, &suffix).await {
            return docs;
        }

        let result = self
            .guards
            .vector
            .call(tenant_id, deadline, || {
                self.retrieval.vector(tenant_id, embedding)
            })
            .await;
        self.finish_side(tenant_id, "vector", &suffix, result).await
    }

    async fn cached_side(&self, tenant_id: &TenantId, suffix: &str) -> Option<Vec<ScoredDoc>> {
        match self.cache.get::<Vec<ScoredDoc>>(tenant_id, suffix).await {
            Ok(hit) => hit,
            Err(error) => {
                tracing::warn!(error = %error, "retrieval cache read failed");
                None
            }
        }
    }

    async fn finish_side(
        &self,
        tenant_id: &TenantId,
        side: &'static str,
        suffix: &str,
        result: Result<Vec<ScoredDoc>, DependencyError>,
    ) -> Vec<ScoredDoc> {
        match result {
            Ok(docs) => {
                if let Err(error) = self
                    .cache
                    .set(
                        tenant_id,
                        suffix,
                        &docs,
                        Some(self.config.retrieval_cache_ttl),
                    )
                    .await
                {
                    tracing::warn!(error = %error, "retrieval cache write failed");
                }
                docs
            }
            Err(error) => {
                tracing::warn!(side, error = %error, "retrieval side failed");
                Vec::new()
            }
        }
    }

    fn abandon_side(&self, side: &'static str) {
        self.config
            .event_listeners
            .emit(&PipelineEvent::SlowSideAbandoned {
                side,
                timestamp: std::time::Instant::now(),
            });
        tracing::warn!(side, "slow retrieval side abandoned after patience window");
    }

    fn block_leakage(&self, request: &QueuedRequest, violation: &IsolationViolation) {
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "fairgate_cross_tenant_leakage_total",
            "source" => "retrieval"
        )
        .increment(1);

        self.config.event_listeners.emit(&PipelineEvent::LeakageBlocked {
            tenant_id: request.tenant_id.clone(),
            doc_id: violation.doc_id.clone(),
            timestamp: std::time::Instant::now(),
        });
        self.audit.security(SecurityEvent {
            tenant_id: request.tenant_id.clone(),
            kind: fairgate_core::SecurityKind::CrossTenantLeakage,
            detail: violation.to_string(),
            anomaly_score: Some(100.0),
            ts_ms: unix_now_ms(),
        });
        self.audit_status(request, "failed");
        tracing::error!(
            request_id = %request.request_id,
            requesting_tenant = %violation.requesting_tenant,
            document_tenant = %violation.document_tenant,
            doc_id = %violation.doc_id,
            "cross-tenant leakage blocked"
        );
    }

    fn raise_behavior_flag(&self, tenant_id: &TenantId, flag: BehaviorFlag) {
        let score = flag.anomaly_score(self.behavior.config());
        tracing::warn!(
            tenant_id = %tenant_id,
            kind = flag.security_kind().as_str(),
            anomaly_score = score,
            "behaviour detector fired"
        );
        self.audit.security(SecurityEvent {
            tenant_id: tenant_id.clone(),
            kind: flag.security_kind(),
            detail: flag.detail(),
            anomaly_score: Some(score),
            ts_ms: unix_now_ms(),
        });
    }

    fn maybe_redact(&self, text: String) -> String {
        if self.config.pii_redaction_enabled {
            self.redactor.redact(&text)
        } else {
            text
        }
    }

    fn audit_status(&self, request: &QueuedRequest, status: &str) {
        self.audit.audit(AuditRecord {
            tenant_id: request.tenant_id.clone(),
            user_id: request.user_id.clone(),
            request_id: Some(request.request_id.clone()),
            action: "rag_query".to_string(),
            status: status.to_string(),
            ts_ms: unix_now_ms(),
        });
    }

    fn outcome(
        &self,
        request: &QueuedRequest,
        answer: String,
        sources: Vec<ScoredDoc>,
        cost_dollars: f64,
        tokens_used: u64,
        started: Instant,
    ) -> QueryOutcome {
        QueryOutcome {
            request_id: request.request_id.clone(),
            tenant_id: request.tenant_id.clone(),
            answer,
            sources,
            cost_dollars,
            tokens_used,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn with_citations(answer: &str, docs: &[ScoredDoc]) -> String {
    let citations = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {} (score: {:.2})", i + 1, doc.doc_id, doc.score))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{answer}\n\nCitations:\n{citations}")
}

fn embedding_digest(embedding: &[f32]) -> String {
    let mut hasher = blake3::Hasher::new();
    for value in embedding {
        hasher.update(&value.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
