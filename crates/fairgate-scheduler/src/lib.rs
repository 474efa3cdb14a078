//! Weighted-fair scheduling and the worker pool for the fairgate platform.
//!
//! The [`FairScheduler`] dispenses queued requests to a bounded
//! [`WorkerPool`] while enforcing per-tier in-flight caps (Enterprise 50%,
//! Professional 30%, Starter 15%, Free 5% of instance capacity) and a
//! global in-flight ceiling. Scheduling is work-conserving: capacity a tier
//! is not using can be borrowed by tiers with demand, so the instance never
//! idles while work is queued.
//!
//! Noisy-neighbour detection rides on every dispatch: a tenant holding more
//! than 20% of instance capacity is flagged in metrics, more than 30%
//! raises a security event.

mod config;
pub mod events;
mod scheduler;
mod worker;

pub use config::{SchedulerConfig, SchedulerConfigBuilder, WorkerConfig, WorkerConfigBuilder};
pub use events::SchedulerEvent;
pub use scheduler::{FairScheduler, InFlightEntry, InFlightSnapshot};
pub use worker::{CompletionHandler, RequestProcessor, WorkerPool};
