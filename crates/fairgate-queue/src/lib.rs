//! Two-level request queue for the fairgate platform.
//!
//! A bounded instance-local FIFO absorbs normal load; overflow spills into
//! a priority set in the shared key-value store ordered by tier and arrival
//! time; expired items land in a dead-letter list. Key layout:
//!
//! - `genai:queue:local:<instance-id>`: local FIFO list
//! - `genai:queue:global:priority`: shared ordered set
//! - `genai:queue:dlq`: dead letters
//!
//! Ordering guarantees: strict FIFO within the local level regardless of
//! tier; strict tier priority with per-tier FIFO on the global level.

mod config;
pub mod events;
mod queue;
mod sweeper;

pub use config::{QueueConfig, QueueConfigBuilder};
pub use events::{QueueEvent, QueueLevel};
pub use queue::{Enqueued, EnqueueError, QueueDepths, QueueError, TwoLevelQueue};
pub use sweeper::QueueSweeper;
