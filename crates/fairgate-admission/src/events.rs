//! Events emitted by the admission gate.

use fairgate_core::{PlatformEvent, TenantId, Tier};
use std::time::Instant;

#[derive(Debug)]
pub enum AdmissionEvent {
    /// A request passed every admission check and was handed to the queue.
    Admitted {
        tenant_id: TenantId,
        tier: Tier,
        timestamp: Instant,
    },
    /// A request was rejected; `code` is the caller-visible error code.
    Rejected {
        tenant_id: TenantId,
        code: &'static str,
        timestamp: Instant,
    },
}

impl PlatformEvent for AdmissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdmissionEvent::Admitted { .. } => "request_admitted",
            AdmissionEvent::Rejected { .. } => "request_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            AdmissionEvent::Admitted { timestamp, .. }
            | AdmissionEvent::Rejected { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        "admission_gate"
    }
}
