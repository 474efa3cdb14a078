//! Core infrastructure for the fairgate platform.
//!
//! This crate provides the pieces every other fairgate crate builds on:
//! - Tenant, tier, and request types shared across the admission, queueing,
//!   and scheduling layers
//! - The caller-visible error taxonomy and the dependency error
//!   classification used by the resilience layer
//! - Event-listener infrastructure for observability
//! - Adapter interfaces for the external collaborators (tenant directory,
//!   retrieval backends, LLM, key-value store, audit sink)
//! - An in-memory key-value store usable as a reference implementation and
//!   in tests

pub mod adapters;
pub mod error;
pub mod events;
pub mod memory;
pub mod types;

pub use adapters::{
    AuditRecord, AuditSink, Completion, CostEvent, CostKind, KvStore, LlmClient, RetrievalBackend,
    SecurityEvent, SecurityKind, TenantDirectory,
};
pub use error::{DependencyError, ErrorKind, ProcessFailure};
pub use events::{EventListener, EventListeners, FnListener, PlatformEvent};
pub use memory::MemoryKv;
pub use types::{
    quota_day, unix_now_ms, QueryOutcome, QueryPayload, QueuedRequest, RequestId, ScoredDoc,
    TenantConfig, TenantId, Tier,
};
