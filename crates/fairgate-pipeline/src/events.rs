//! Events emitted by the RAG pipeline.

use fairgate_core::{PlatformEvent, TenantId};
use std::time::Instant;

#[derive(Debug)]
pub enum PipelineEvent {
    RetrievalCompleted {
        tenant_id: TenantId,
        documents: usize,
        timestamp: Instant,
    },
    /// One retrieval side outlived the patience window and was abandoned.
    SlowSideAbandoned {
        side: &'static str,
        timestamp: Instant,
    },
    NoDocuments {
        tenant_id: TenantId,
        timestamp: Instant,
    },
    /// The isolation check refused a foreign document.
    LeakageBlocked {
        tenant_id: TenantId,
        doc_id: String,
        timestamp: Instant,
    },
    /// Retrieval snippets served because the LLM circuit is open.
    FallbackServed {
        tenant_id: TenantId,
        timestamp: Instant,
    },
    LlmCompleted {
        tenant_id: TenantId,
        tokens_used: u64,
        timestamp: Instant,
    },
}

impl PlatformEvent for PipelineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::RetrievalCompleted { .. } => "retrieval_completed",
            PipelineEvent::SlowSideAbandoned { .. } => "slow_side_abandoned",
            PipelineEvent::NoDocuments { .. } => "no_documents",
            PipelineEvent::LeakageBlocked { .. } => "leakage_blocked",
            PipelineEvent::FallbackServed { .. } => "fallback_served",
            PipelineEvent::LlmCompleted { .. } => "llm_completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PipelineEvent::RetrievalCompleted { timestamp, .. }
            | PipelineEvent::SlowSideAbandoned { timestamp, .. }
            | PipelineEvent::NoDocuments { timestamp, .. }
            | PipelineEvent::LeakageBlocked { timestamp, .. }
            | PipelineEvent::FallbackServed { timestamp, .. }
            | PipelineEvent::LlmCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        "rag_pipeline"
    }
}
