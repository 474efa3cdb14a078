use crate::circuit::CircuitState;
use crate::events::{BreakerEvent, RetryEvent};
use fairgate_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a per-tenant circuit breaker.
pub struct BreakerConfig {
    pub(crate) name: String,
    pub(crate) fail_max: usize,
    pub(crate) reset_timeout: Duration,
    pub(crate) event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a [`crate::CircuitBreaker`].
pub struct BreakerConfigBuilder {
    name: String,
    fail_max: usize,
    reset_timeout: Duration,
    event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            fail_max: 5,
            reset_timeout: Duration::from_secs(60),
            event_listeners: EventListeners::new(),
        }
    }

    /// Name of the guarded dependency, used in events and metrics labels.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Consecutive failures before a tenant's circuit opens.
    ///
    /// Default: 5
    pub fn fail_max(mut self, fail_max: usize) -> Self {
        self.fail_max = fail_max;
        self
    }

    /// How long an open circuit waits before allowing a half-open probe.
    ///
    /// Default: 60 seconds
    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    /// Register a callback for state transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback for short-circuited calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if matches!(event, BreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    pub(crate) fn into_config(self) -> BreakerConfig {
        BreakerConfig {
            name: self.name,
            fail_max: self.fail_max,
            reset_timeout: self.reset_timeout,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds the configuration and returns a [`crate::CircuitBreaker`].
    pub fn build(self) -> crate::CircuitBreaker {
        crate::CircuitBreaker::new(self.into_config())
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy with exponential backoff.
///
/// `max_attempts` includes the initial call, so `max_attempts = 3` means one
/// initial attempt plus two retries. The backoff for the n-th retry is
/// `min(max_wait, base × 2^(n-1))`.
pub struct RetryPolicy {
    pub(crate) name: String,
    pub(crate) max_attempts: usize,
    pub(crate) base: Duration,
    pub(crate) max_wait: Duration,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl RetryPolicy {
    /// Creates a new policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Backoff before the attempt following attempt number `attempt`
    /// (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let factor = 2u32.saturating_pow(exponent);
        self.base.saturating_mul(factor).min(self.max_wait)
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    name: String,
    max_attempts: usize,
    base: Duration,
    max_wait: Duration,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            max_attempts: 3,
            base: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
            event_listeners: EventListeners::new(),
        }
    }

    /// Name used in events.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum total attempts, including the initial call.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Initial backoff interval for exponential growth.
    ///
    /// Default: 1 second
    pub fn exponential_backoff(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Upper bound on any single backoff interval.
    ///
    /// Default: 10 seconds
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Register a callback invoked when a retry is scheduled.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::AttemptScheduled { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            name: self.name,
            max_attempts: self.max_attempts,
            base: self.base,
            max_wait: self.max_wait,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
