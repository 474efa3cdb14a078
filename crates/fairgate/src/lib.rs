//! fairgate: a multi-tenant admission, scheduling, and resilience runtime
//! for retrieval-augmented request serving.
//!
//! The [`Runtime`] owns the whole request lifecycle:
//!
//! 1. **Admission**: per-tenant token bucket, injection screen, daily
//!    quota, tier priority and deadline stamping
//! 2. **Two-level queue**: bounded local FIFO spilling into a shared
//!    priority set, with a dead-letter list for expired work
//! 3. **Fair scheduling**: work-conserving weighted fair queuing with
//!    per-tier in-flight caps and noisy-neighbour detection
//! 4. **Worker pool**: bounded cooperative workers driving the RAG
//!    pipeline under per-request deadlines
//! 5. **Resilience**: per-tenant circuit breakers and deadline-aware
//!    retries around every external dependency
//! 6. **Accounting**: cost, audit, and anomaly events on every dispatch
//!
//! External collaborators (tenant directory, retrieval backends, LLM,
//! key-value store, audit sink) are supplied as [`Adapters`]; an in-memory
//! store ([`fairgate_core::MemoryKv`]) ships for tests and local runs.
//!
//! ```no_run
//! use fairgate::admission::AdmissionRequest;
//! use fairgate::core::{QueryPayload, TenantId};
//! use fairgate::{Adapters, PlatformConfig, Runtime};
//!
//! # async fn example(adapters: Adapters) -> Result<(), fairgate::PlatformError> {
//! let runtime = Runtime::start(PlatformConfig::from_env(), adapters);
//!
//! let outcome = runtime
//!     .execute(AdmissionRequest {
//!         tenant_id: TenantId::from("acme"),
//!         user_id: "u-7".to_string(),
//!         payload: QueryPayload::text("summarize the renewal terms"),
//!     })
//!     .await?;
//! println!("{}", outcome.answer);
//!
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod hub;
mod runtime;

pub use config::PlatformConfig;
pub use hub::CompletionHub;
pub use runtime::{Adapters, PlatformError, Runtime, SubmitReceipt};

pub use fairgate_admission as admission;
pub use fairgate_cache as cache;
pub use fairgate_core as core;
pub use fairgate_pipeline as pipeline;
pub use fairgate_queue as queue;
pub use fairgate_resilience as resilience;
pub use fairgate_scheduler as scheduler;
