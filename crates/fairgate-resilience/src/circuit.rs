use crate::config::BreakerConfig;
use crate::events::BreakerEvent;
use fairgate_core::TenantId;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::time::Instant as WallInstant;
use tokio::time::Instant;

/// Represents the state of one tenant's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass; consecutive failures are counted.
    Closed,
    /// Calls are rejected until the reset timeout lapses.
    Open,
    /// A single probe is allowed to test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Outcome of asking a circuit for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    Permitted { probe: bool },
    Rejected,
}

/// Per-tenant circuit state machine.
///
/// Transitions: Closed opens after `fail_max` consecutive failures; Open
/// half-opens once `reset_timeout` has elapsed; HalfOpen allows exactly one
/// probe at a time and closes on probe success, reopens on probe failure.
#[derive(Debug)]
pub(crate) struct Circuit {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    probe_pending: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_pending: false,
        }
    }
}

impl Circuit {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    pub fn try_acquire(&mut self, config: &BreakerConfig, tenant_id: &TenantId) -> Acquire {
        match self.state {
            CircuitState::Closed => {
                config.event_listeners.emit(&BreakerEvent::CallPermitted {
                    service: config.name.clone(),
                    tenant_id: tenant_id.clone(),
                    timestamp: WallInstant::now(),
                    state: self.state,
                });
                Acquire::Permitted { probe: false }
            }
            CircuitState::Open => {
                let waited_out = self
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= config.reset_timeout);
                if waited_out {
                    self.transition_to(CircuitState::HalfOpen, config, tenant_id);
                    self.probe_pending = true;
                    config.event_listeners.emit(&BreakerEvent::ProbeIssued {
                        service: config.name.clone(),
                        tenant_id: tenant_id.clone(),
                        timestamp: WallInstant::now(),
                    });
                    Acquire::Permitted { probe: true }
                } else {
                    self.reject(config, tenant_id);
                    Acquire::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_pending {
                    self.reject(config, tenant_id);
                    Acquire::Rejected
                } else {
                    self.probe_pending = true;
                    config.event_listeners.emit(&BreakerEvent::ProbeIssued {
                        service: config.name.clone(),
                        tenant_id: tenant_id.clone(),
                        timestamp: WallInstant::now(),
                    });
                    Acquire::Permitted { probe: true }
                }
            }
        }
    }

    pub fn record_success(&mut self, config: &BreakerConfig, tenant_id: &TenantId) {
        match self.state {
            CircuitState::HalfOpen => {
                self.probe_pending = false;
                self.transition_to(CircuitState::Closed, config, tenant_id);
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self, config: &BreakerConfig, tenant_id: &TenantId) {
        match self.state {
            CircuitState::HalfOpen => {
                self.probe_pending = false;
                self.transition_to(CircuitState::Open, config, tenant_id);
            }
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= config.fail_max {
                    self.transition_to(CircuitState::Open, config, tenant_id);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn reset(&mut self, config: &BreakerConfig, tenant_id: &TenantId) {
        self.transition_to(CircuitState::Closed, config, tenant_id);
    }

    fn reject(&self, config: &BreakerConfig, tenant_id: &TenantId) {
        config.event_listeners.emit(&BreakerEvent::CallRejected {
            service: config.name.clone(),
            tenant_id: tenant_id.clone(),
            timestamp: WallInstant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!(
            "fairgate_breaker_short_circuits_total",
            "service" => config.name.clone()
        )
        .increment(1);
    }

    fn transition_to(&mut self, state: CircuitState, config: &BreakerConfig, tenant_id: &TenantId) {
        if self.state == state {
            return;
        }

        let from_state = self.state;
        config.event_listeners.emit(&BreakerEvent::StateTransition {
            service: config.name.clone(),
            tenant_id: tenant_id.clone(),
            timestamp: WallInstant::now(),
            from_state,
            to_state: state,
        });

        tracing::info!(
            service = %config.name,
            tenant_id = %tenant_id,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "fairgate_breaker_transitions_total",
            "service" => config.name.clone(),
            "from" => from_state.as_str(),
            "to" => state.as_str()
        )
        .increment(1);

        self.state = state;
        match state {
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.probe_pending = false;
            }
            CircuitState::HalfOpen => {}
        }
    }
}
