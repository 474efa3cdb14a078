//! Work-conserving weighted-fair scheduling over the two-level queue.

use crate::config::SchedulerConfig;
use crate::events::SchedulerEvent;
use fairgate_core::{
    unix_now_ms, AuditSink, QueuedRequest, RequestId, SecurityEvent, SecurityKind, TenantId, Tier,
};
use fairgate_queue::{QueueError, TwoLevelQueue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify};

/// A dispatched request, tracked until its completion signal.
#[derive(Debug, Clone)]
pub struct InFlightEntry {
    pub request: QueuedRequest,
    pub started_at_ms: u64,
}

/// Point-in-time view of the in-flight set, for observability and tests.
#[derive(Debug, Clone)]
pub struct InFlightSnapshot {
    pub total: usize,
    pub by_tier: [usize; 4],
    pub by_tenant: HashMap<TenantId, usize>,
}

#[derive(Default)]
struct SchedulerState {
    by_tenant: HashMap<TenantId, usize>,
    by_tier: [usize; 4],
    total: usize,
    in_flight: HashMap<RequestId, InFlightEntry>,
}

/// Weighted-fair scheduler.
///
/// Selection obeys per-tier in-flight caps derived from the tier fair
/// shares (parts per thousand of `max_in_flight`, floored) and the global
/// in-flight ceiling. When every tier with demand sits at its cap but the
/// instance has spare capacity, the globally highest-priority request is
/// dispatched anyway, so idle share is borrowed rather than wasted.
///
/// All scheduler state is mutated under a single mutex: the scheduler's
/// exclusion domain also covers the queue heads, so `next` is the only
/// consumer of the queue on this instance.
pub struct FairScheduler {
    queue: Arc<TwoLevelQueue>,
    audit: Arc<dyn AuditSink>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    wake: Notify,
}

impl FairScheduler {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<TwoLevelQueue>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            queue,
            audit,
            config,
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
        }
    }

    /// In-flight cap for a tier: `floor(max_in_flight × share)`.
    pub fn tier_cap(&self, tier: Tier) -> usize {
        self.config.max_in_flight * tier.fair_share_permille() as usize / 1000
    }

    /// The queue this scheduler consumes.
    pub fn queue(&self) -> &Arc<TwoLevelQueue> {
        &self.queue
    }

    pub(crate) fn config_events(&self) -> &fairgate_core::EventListeners<SchedulerEvent> {
        &self.config.event_listeners
    }

    /// Signals that new work may be available (called after enqueue).
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Selects the next request to dispatch, or `None` when the instance is
    /// saturated or no work is available.
    pub async fn next(&self) -> Result<Option<QueuedRequest>, QueueError> {
        let mut state = self.state.lock().await;
        if state.total >= self.config.max_in_flight {
            return Ok(None);
        }

        for tier in Tier::ALL {
            if state.by_tier[tier.priority() as usize] < self.tier_cap(tier) {
                if let Some(request) = self.take(Some(tier)).await? {
                    self.register(&mut state, &request);
                    return Ok(Some(request));
                }
            }
        }

        // Work conservation: every tier with demand is at its cap, but the
        // instance still has room.
        if let Some(request) = self.take(None).await? {
            self.register(&mut state, &request);
            return Ok(Some(request));
        }

        Ok(None)
    }

    /// Blocks until a request is available, waking on enqueue/completion
    /// signals with a polling fallback.
    pub async fn acquire(&self) -> Result<QueuedRequest, QueueError> {
        loop {
            if let Some(request) = self.next().await? {
                return Ok(request);
            }
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Records completion of a previously dispatched request. Decrements
    /// are strictly monotonic: unknown ids are ignored and return `None`.
    pub async fn complete(&self, request_id: &RequestId) -> Option<InFlightEntry> {
        let mut state = self.state.lock().await;
        let entry = state.in_flight.remove(request_id)?;
        let tier_index = entry.request.tier.priority() as usize;
        state.by_tier[tier_index] = state.by_tier[tier_index].saturating_sub(1);
        let remaining = match state.by_tenant.get_mut(&entry.request.tenant_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            state.by_tenant.remove(&entry.request.tenant_id);
        }
        state.total = state.total.saturating_sub(1);
        drop(state);

        self.config.event_listeners.emit(&SchedulerEvent::Completed {
            request_id: request_id.clone(),
            tenant_id: entry.request.tenant_id.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::gauge!("fairgate_in_flight_total").decrement(1.0);

        self.wake.notify_one();
        Some(entry)
    }

    /// Empties the in-flight set, returning the abandoned entries. Used at
    /// shutdown after the grace period so outstanding work can be
    /// dead-lettered.
    pub async fn drain_in_flight(&self) -> Vec<InFlightEntry> {
        let mut state = self.state.lock().await;
        state.by_tenant.clear();
        state.by_tier = [0; 4];
        state.total = 0;
        state.in_flight.drain().map(|(_, entry)| entry).collect()
    }

    /// Current in-flight accounting.
    pub async fn snapshot(&self) -> InFlightSnapshot {
        let state = self.state.lock().await;
        InFlightSnapshot {
            total: state.total,
            by_tier: state.by_tier,
            by_tenant: state.by_tenant.clone(),
        }
    }

    /// Fraction of instance capacity a tenant currently occupies.
    pub async fn noisy_neighbor_score(&self, tenant_id: &TenantId) -> f64 {
        let state = self.state.lock().await;
        let count = state.by_tenant.get(tenant_id).copied().unwrap_or(0);
        (count as f64 / self.config.max_in_flight as f64).min(1.0)
    }

    /// Dequeues the next dispatchable request, discarding anything already
    /// past its deadline to the DLQ on the way.
    async fn take(&self, tier: Option<Tier>) -> Result<Option<QueuedRequest>, QueueError> {
        loop {
            let candidate = match tier {
                Some(tier) => self.queue.dequeue_tier(tier).await?,
                None => self.queue.dequeue().await?,
            };
            let Some(request) = candidate else {
                return Ok(None);
            };
            if request.is_expired(unix_now_ms()) {
                tracing::warn!(
                    request_id = %request.request_id,
                    "expired request discarded at dispatch"
                );
                if let Err(error) = self.queue.push_dlq(&request).await {
                    tracing::error!(error = %error, "failed to dead-letter expired request");
                }
                continue;
            }
            return Ok(Some(request));
        }
    }

    fn register(&self, state: &mut SchedulerState, request: &QueuedRequest) {
        let tier_index = request.tier.priority() as usize;
        state.by_tier[tier_index] += 1;
        let tenant_count = state
            .by_tenant
            .entry(request.tenant_id.clone())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        let tenant_count = *tenant_count;
        state.total += 1;
        state.in_flight.insert(
            request.request_id.clone(),
            InFlightEntry {
                request: request.clone(),
                started_at_ms: unix_now_ms(),
            },
        );

        self.config.event_listeners.emit(&SchedulerEvent::Dispatched {
            request_id: request.request_id.clone(),
            tenant_id: request.tenant_id.clone(),
            tier: request.tier,
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        {
            metrics::gauge!("fairgate_in_flight_total").increment(1.0);
            metrics::counter!(
                "fairgate_dispatches_total",
                "tier" => request.tier.as_str()
            )
            .increment(1);
        }

        self.check_noisy_neighbor(&request.tenant_id, tenant_count);
    }

    fn check_noisy_neighbor(&self, tenant_id: &TenantId, tenant_count: usize) {
        let permille = tenant_count * 1000 / self.config.max_in_flight;
        if permille <= self.config.noisy_neighbor_permille as usize {
            return;
        }

        let fraction = tenant_count as f64 / self.config.max_in_flight as f64;
        self.config
            .event_listeners
            .emit(&SchedulerEvent::NoisyNeighbor {
                tenant_id: tenant_id.clone(),
                fraction,
                timestamp: Instant::now(),
            });

        #[cfg(feature = "metrics")]
        metrics::gauge!(
            "fairgate_noisy_neighbor_fraction",
            "tenant_id" => tenant_id.to_string()
        )
        .set(fraction);

        tracing::warn!(
            tenant_id = %tenant_id,
            fraction,
            "tenant exceeds noisy-neighbour threshold"
        );

        if permille > self.config.noisy_alert_permille as usize {
            self.audit.security(SecurityEvent {
                tenant_id: tenant_id.clone(),
                kind: SecurityKind::NoisyNeighbor,
                detail: format!("tenant occupies {:.0}% of instance capacity", fraction * 100.0),
                anomaly_score: Some((fraction * 100.0).min(100.0)),
                ts_ms: unix_now_ms(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairgate_core::adapters::NullAuditSink;
    use fairgate_core::{MemoryKv, QueryPayload};
    use fairgate_queue::QueueConfig;

    fn scheduler(max_in_flight: usize, local_depth: usize, global_depth: usize) -> FairScheduler {
        let queue_config = QueueConfig::builder()
            .instance_id("pod-test")
            .max_local_depth(local_depth)
            .max_global_depth(global_depth)
            .build();
        let queue = Arc::new(TwoLevelQueue::new(queue_config, Arc::new(MemoryKv::new())));
        FairScheduler::new(
            SchedulerConfig::builder().max_in_flight(max_in_flight).build(),
            queue,
            Arc::new(NullAuditSink),
        )
    }

    fn request(id: &str, tenant: &str, tier: Tier, submitted_at_ms: u64) -> QueuedRequest {
        let now = unix_now_ms();
        QueuedRequest {
            request_id: RequestId::new(id),
            tenant_id: TenantId::from(tenant),
            user_id: "u1".to_string(),
            tier,
            submitted_at_ms,
            deadline_at_ms: now + 60_000,
            payload: QueryPayload::text("q"),
        }
    }

    async fn enqueue(scheduler: &FairScheduler, request: &QueuedRequest) {
        scheduler.queue().enqueue(request).await.unwrap();
    }

    #[tokio::test]
    async fn caps_are_floored_fair_shares() {
        let scheduler = scheduler(50, 10, 10);
        assert_eq!(scheduler.tier_cap(Tier::Enterprise), 25);
        assert_eq!(scheduler.tier_cap(Tier::Professional), 15);
        assert_eq!(scheduler.tier_cap(Tier::Starter), 7);
        assert_eq!(scheduler.tier_cap(Tier::Free), 2);
    }

    #[tokio::test]
    async fn global_queue_dispatches_by_priority_within_caps() {
        // Everything overflows to the global set, so tier selection is free
        // to pick per tier.
        let scheduler = scheduler(10, 0, 100);
        let base = unix_now_ms();
        for i in 0..4u64 {
            enqueue(&scheduler, &request(&format!("f{i}"), "free-co", Tier::Free, base + i)).await;
        }
        enqueue(&scheduler, &request("e0", "big-co", Tier::Enterprise, base + 10)).await;

        // Enterprise is selected first despite arriving last.
        let first = scheduler.next().await.unwrap().unwrap();
        assert_eq!(first.request_id.as_str(), "e0");

        // Free's floored cap is 0 here, so Free rides on work conservation
        // in submission order.
        let second = scheduler.next().await.unwrap().unwrap();
        assert_eq!(second.request_id.as_str(), "f0");
    }

    #[tokio::test]
    async fn total_in_flight_never_exceeds_ceiling() {
        let scheduler = scheduler(3, 0, 100);
        let base = unix_now_ms();
        for i in 0..5u64 {
            enqueue(&scheduler, &request(&format!("r{i}"), "acme", Tier::Enterprise, base + i)).await;
        }

        let mut dispatched = Vec::new();
        while let Some(request) = scheduler.next().await.unwrap() {
            dispatched.push(request);
        }
        assert_eq!(dispatched.len(), 3);
        assert_eq!(scheduler.snapshot().await.total, 3);

        // A completion frees exactly one slot.
        scheduler.complete(&dispatched[0].request_id).await.unwrap();
        assert!(scheduler.next().await.unwrap().is_some());
        assert_eq!(scheduler.snapshot().await.total, 3);
    }

    #[tokio::test]
    async fn completion_is_monotonic() {
        let scheduler = scheduler(3, 10, 10);
        assert!(scheduler
            .complete(&RequestId::new("never-dispatched"))
            .await
            .is_none());
        assert_eq!(scheduler.snapshot().await.total, 0);
    }

    #[tokio::test]
    async fn work_conservation_borrows_idle_share() {
        // Only Free demand; Free's cap is 1 of 20, but the instance should
        // still fill up.
        let scheduler = scheduler(20, 0, 100);
        let base = unix_now_ms();
        for i in 0..5u64 {
            enqueue(&scheduler, &request(&format!("f{i}"), "free-co", Tier::Free, base + i)).await;
        }

        let mut count = 0;
        while scheduler.next().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.by_tier[Tier::Free.priority() as usize], 5);
    }

    #[tokio::test]
    async fn expired_requests_are_dead_lettered_not_dispatched() {
        let scheduler = scheduler(10, 10, 10);
        let mut stale = request("stale", "acme", Tier::Enterprise, unix_now_ms());
        stale.deadline_at_ms = unix_now_ms().saturating_sub(5);
        enqueue(&scheduler, &stale).await;

        assert!(scheduler.next().await.unwrap().is_none());
        let depths = scheduler.queue().depths().await.unwrap();
        assert_eq!(depths.dlq, 1);
        assert_eq!(depths.pending(), 0);
    }
}
