use crate::events::SchedulerEvent;
use fairgate_core::events::EventListeners;
use std::time::Duration;

/// Configuration for the fair scheduler.
pub struct SchedulerConfig {
    pub(crate) max_in_flight: usize,
    pub(crate) poll_interval: Duration,
    /// Per-tenant running fraction (parts per thousand) past which a tenant
    /// is flagged in metrics.
    pub(crate) noisy_neighbor_permille: u32,
    /// Fraction past which a security event is emitted.
    pub(crate) noisy_alert_permille: u32,
    pub(crate) event_listeners: EventListeners<SchedulerEvent>,
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::new()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`SchedulerConfig`].
pub struct SchedulerConfigBuilder {
    max_in_flight: usize,
    poll_interval: Duration,
    noisy_neighbor_permille: u32,
    noisy_alert_permille: u32,
    event_listeners: EventListeners<SchedulerEvent>,
}

impl SchedulerConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_in_flight: 50,
            poll_interval: Duration::from_millis(100),
            noisy_neighbor_permille: 200,
            noisy_alert_permille: 300,
            event_listeners: EventListeners::new(),
        }
    }

    /// Global ceiling on concurrently executing requests per instance.
    ///
    /// Default: 50
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Fallback polling interval for idle workers, alongside event-driven
    /// wake-ups.
    ///
    /// Default: 100 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Per-tenant capacity fraction (parts per thousand) flagged in
    /// metrics.
    ///
    /// Default: 200 (20%)
    pub fn noisy_neighbor_permille(mut self, permille: u32) -> Self {
        self.noisy_neighbor_permille = permille;
        self
    }

    /// Per-tenant capacity fraction (parts per thousand) escalated as a
    /// security event.
    ///
    /// Default: 300 (30%)
    pub fn noisy_alert_permille(mut self, permille: u32) -> Self {
        self.noisy_alert_permille = permille;
        self
    }

    /// Register an event listener on scheduler activity.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: fairgate_core::EventListener<SchedulerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        SchedulerConfig {
            max_in_flight: self.max_in_flight,
            poll_interval: self.poll_interval,
            noisy_neighbor_permille: self.noisy_neighbor_permille,
            noisy_alert_permille: self.noisy_alert_permille,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the worker pool.
#[derive(Clone)]
pub struct WorkerConfig {
    pub(crate) pool_size: usize,
    pub(crate) shutdown_grace: Duration,
    pub(crate) compute_cost_per_second: f64,
    pub(crate) target_latency_p95: Option<Duration>,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`WorkerConfig`].
pub struct WorkerConfigBuilder {
    pool_size: usize,
    shutdown_grace: Duration,
    compute_cost_per_second: f64,
    target_latency_p95: Option<Duration>,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self {
            pool_size: 10,
            shutdown_grace: Duration::from_secs(120),
            compute_cost_per_second: 0.001,
            target_latency_p95: Some(Duration::from_secs(2)),
        }
    }

    /// Number of cooperative workers.
    ///
    /// Default: 10
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// How long shutdown waits for in-progress work before cancelling it
    /// and returning it to the DLQ.
    ///
    /// Default: 120 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Dollar rate for the compute cost event emitted per completion.
    ///
    /// Default: 0.001 $/s
    pub fn compute_cost_per_second(mut self, rate: f64) -> Self {
        self.compute_cost_per_second = rate;
        self
    }

    /// Latency above which a completion logs an SLA violation warning.
    ///
    /// Default: 2 seconds
    pub fn target_latency_p95(mut self, target: Option<Duration>) -> Self {
        self.target_latency_p95 = target;
        self
    }

    pub fn build(self) -> WorkerConfig {
        WorkerConfig {
            pool_size: self.pool_size,
            shutdown_grace: self.shutdown_grace,
            compute_cost_per_second: self.compute_cost_per_second,
            target_latency_p95: self.target_latency_p95,
        }
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
