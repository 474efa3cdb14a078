//! Admission control for the fairgate platform.
//!
//! The gate validates each incoming request, screens it for prompt
//! injection, enforces the per-tenant token bucket and daily quota, then
//! stamps a tier priority and deadline before handing off to the queue.
//!
//! ```rust
//! use fairgate_admission::{AdmissionConfig, AdmissionGate, AdmissionRequest};
//! use fairgate_core::{adapters::NullAuditSink, MemoryKv, QueryPayload, TenantId};
//! use std::sync::Arc;
//!
//! # async fn example(tenants: Arc<dyn fairgate_core::TenantDirectory>) {
//! let gate = AdmissionGate::new(
//!     AdmissionConfig::default(),
//!     tenants,
//!     Arc::new(MemoryKv::new()),
//!     Arc::new(NullAuditSink),
//! );
//!
//! match gate
//!     .admit(AdmissionRequest {
//!         tenant_id: TenantId::from("acme"),
//!         user_id: "u-7".to_string(),
//!         payload: QueryPayload::text("what changed in the latest contract?"),
//!     })
//!     .await
//! {
//!     Ok(admitted) => println!("queued as {}", admitted.request.request_id),
//!     Err(rejection) => println!("rejected: {}", rejection.kind()),
//! }
//! # }
//! ```

mod bucket;
mod config;
pub mod events;
mod gate;
mod screen;

pub use bucket::{OperationClass, TokenBucket};
pub use config::{AdmissionConfig, AdmissionConfigBuilder};
pub use events::AdmissionEvent;
pub use gate::{Admitted, AdmissionGate, AdmissionRequest, RateLimitInfo, Rejection};
pub use screen::InjectionScreen;
