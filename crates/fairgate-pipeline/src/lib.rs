//! RAG orchestration for the fairgate platform.
//!
//! One dispatched request flows through: hybrid retrieval (BM25 + vector in
//! parallel, weighted score fusion), the tenant-isolation check, PII
//! redaction, the resilient LLM call under the remaining deadline, and
//! deterministic citations. Cost events and behaviour analytics ride on
//! every execution.
//!
//! Partial-failure behavior: zero retrieved documents produce a synthetic
//! no-documents answer without an LLM call; an open LLM circuit serves
//! retrieval snippets when the tenant has `fallback_to_search_enabled`,
//! and surfaces the open circuit otherwise.

mod behavior;
mod config;
pub mod events;
mod fusion;
mod isolation;
mod pipeline;
mod redact;

pub use behavior::{BehaviorConfig, BehaviorFlag, BehaviorTracker};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use events::PipelineEvent;
pub use fusion::{fuse, FusionWeights};
pub use isolation::{check_tenant_isolation, IsolationViolation};
pub use pipeline::{PipelineError, PipelineGuards, RagPipeline};
pub use redact::PiiRedactor;
