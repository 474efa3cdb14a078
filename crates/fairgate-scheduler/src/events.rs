//! Events emitted by the scheduler and worker pool.

use fairgate_core::{PlatformEvent, RequestId, TenantId, Tier};
use std::time::Instant;

#[derive(Debug)]
pub enum SchedulerEvent {
    /// A request left the queue and entered the in-flight set.
    Dispatched {
        request_id: RequestId,
        tenant_id: TenantId,
        tier: Tier,
        timestamp: Instant,
    },
    /// A request left the in-flight set.
    Completed {
        request_id: RequestId,
        tenant_id: TenantId,
        timestamp: Instant,
    },
    /// A tenant crossed the noisy-neighbour running fraction.
    NoisyNeighbor {
        tenant_id: TenantId,
        fraction: f64,
        timestamp: Instant,
    },
    WorkerStarted {
        worker_id: usize,
        timestamp: Instant,
    },
    WorkerStopped {
        worker_id: usize,
        timestamp: Instant,
    },
}

impl PlatformEvent for SchedulerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::Dispatched { .. } => "request_dispatched",
            SchedulerEvent::Completed { .. } => "request_completed",
            SchedulerEvent::NoisyNeighbor { .. } => "noisy_neighbor",
            SchedulerEvent::WorkerStarted { .. } => "worker_started",
            SchedulerEvent::WorkerStopped { .. } => "worker_stopped",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            SchedulerEvent::Dispatched { timestamp, .. }
            | SchedulerEvent::Completed { timestamp, .. }
            | SchedulerEvent::NoisyNeighbor { timestamp, .. }
            | SchedulerEvent::WorkerStarted { timestamp, .. }
            | SchedulerEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        "fair_scheduler"
    }
}
