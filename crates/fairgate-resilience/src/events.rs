//! Events emitted by the breaker and retry layers.

use crate::circuit::CircuitState;
use fairgate_core::{PlatformEvent, TenantId};
use std::time::{Duration, Instant};

/// Events emitted by a per-tenant circuit breaker.
#[derive(Debug)]
pub enum BreakerEvent {
    /// A tenant's circuit moved between states.
    StateTransition {
        service: String,
        tenant_id: TenantId,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was allowed through.
    CallPermitted {
        service: String,
        tenant_id: TenantId,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was short-circuited.
    CallRejected {
        service: String,
        tenant_id: TenantId,
        timestamp: Instant,
    },
    /// The single half-open probe went out.
    ProbeIssued {
        service: String,
        tenant_id: TenantId,
        timestamp: Instant,
    },
}

impl PlatformEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallPermitted { .. } => "call_permitted",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::ProbeIssued { .. } => "probe_issued",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallPermitted { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. }
            | BreakerEvent::ProbeIssued { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { service, .. }
            | BreakerEvent::CallPermitted { service, .. }
            | BreakerEvent::CallRejected { service, .. }
            | BreakerEvent::ProbeIssued { service, .. } => service,
        }
    }
}

/// Events emitted by the retry policy.
#[derive(Debug)]
pub enum RetryEvent {
    /// A retry attempt was scheduled after a transient failure.
    AttemptScheduled {
        name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// All attempts were consumed without success.
    AttemptsExhausted {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl PlatformEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::AttemptScheduled { .. } => "attempt_scheduled",
            RetryEvent::AttemptsExhausted { .. } => "attempts_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::AttemptScheduled { timestamp, .. }
            | RetryEvent::AttemptsExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        match self {
            RetryEvent::AttemptScheduled { name, .. }
            | RetryEvent::AttemptsExhausted { name, .. } => name,
        }
    }
}
