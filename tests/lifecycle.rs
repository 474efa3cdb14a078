//! Runtime lifecycle tests: end-to-end answers, overflow surfacing,
//! request-state accounting, fair-share steady state, noisy-neighbour
//! escalation, and ordered shutdown.

mod common;

use common::*;
use fairgate::{Adapters, PlatformConfig, Runtime};
use fairgate_core::adapters::NullAuditSink;
use fairgate_core::{
    unix_now_ms, CostKind, ErrorKind, MemoryKv, QueryPayload, QueuedRequest, RequestId,
    SecurityKind, TenantId, Tier,
};
use fairgate_queue::{QueueConfig, TwoLevelQueue};
use fairgate_scheduler::{FairScheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;

fn queued(id: &str, tenant: &str, tier: Tier, submitted_at_ms: u64) -> QueuedRequest {
    QueuedRequest {
        request_id: RequestId::new(id),
        tenant_id: TenantId::from(tenant),
        user_id: "u1".to_string(),
        tier,
        submitted_at_ms,
        deadline_at_ms: unix_now_ms() + 60_000,
        payload: QueryPayload::text("q"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runtime_answers_end_to_end_with_cost_accounting() {
    init_tracing();
    let sink = Arc::new(CollectingSink::new());
    let adapters = Adapters {
        tenants: Arc::new(StaticTenants(vec![tenant("acme", Tier::Enterprise)])),
        retrieval: Arc::new(ScriptedRetrieval::with_docs(
            vec![doc("d1", "acme", 0.9)],
            vec![doc("d2", "acme", 0.8)],
        )),
        llm: Arc::new(ScriptedLlm::answering()),
        kv: Arc::new(MemoryKv::new()),
        audit: Arc::clone(&sink) as Arc<dyn fairgate_core::AuditSink>,
    };
    let runtime = Runtime::start(
        PlatformConfig {
            worker_pool_size: 2,
            ..PlatformConfig::default()
        },
        adapters,
    );

    let outcome = runtime
        .execute(admission_request("acme", "when does the contract renew?"))
        .await
        .unwrap();

    assert!(outcome.answer.contains("answer derived from"));
    assert!(outcome.answer.contains("Citations:"));
    assert_eq!(outcome.sources.len(), 2);
    assert_eq!(outcome.tokens_used, 64);
    assert!(outcome.cost_dollars > 0.0);

    // The queues are drained and nothing is left in flight.
    let depths = runtime.queue().depths().await.unwrap();
    assert_eq!(depths.pending(), 0);
    assert_eq!(depths.dlq, 0);
    assert_eq!(runtime.scheduler().snapshot().await.total, 0);

    // Retrieval, LLM-token, and compute costs were all recorded.
    let costs = sink.costs.lock().unwrap();
    for kind in [CostKind::Retrieval, CostKind::LlmTokens, CostKind::Compute] {
        assert!(
            costs.iter().any(|c| c.kind == kind),
            "missing cost event: {}",
            kind.as_str()
        );
    }
    drop(costs);

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runtime_surfaces_queue_overflow_as_503() {
    init_tracing();
    let adapters = Adapters {
        tenants: Arc::new(StaticTenants(vec![tenant("acme", Tier::Professional)])),
        retrieval: Arc::new(ScriptedRetrieval::with_docs(
            vec![doc("d1", "acme", 0.9)],
            Vec::new(),
        )),
        llm: Arc::new(ScriptedLlm::slow(Duration::from_secs(30))),
        kv: Arc::new(MemoryKv::new()),
        audit: Arc::new(NullAuditSink),
    };
    let runtime = Runtime::start(
        PlatformConfig {
            max_queue_depth: 1,
            max_global_depth: 1,
            max_in_flight: 1,
            worker_pool_size: 1,
            poll_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_millis(100),
            ..PlatformConfig::default()
        },
        adapters,
    );

    // One in flight on the stalled worker, one local, one global.
    runtime
        .submit(admission_request("acme", "occupy the worker"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runtime.scheduler().snapshot().await.total, 1);
    for i in 0..2 {
        runtime
            .submit(admission_request("acme", &format!("queued {i}")))
            .await
            .unwrap();
    }

    let err = runtime
        .submit(admission_request("acme", "one too many"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueOverflow);
    assert_eq!(err.kind().http_status(), 503);

    // Shutdown cancels the stalled worker and dead-letters its request.
    let queue = Arc::clone(runtime.queue());
    runtime.shutdown().await;
    let depths = queue.depths().await.unwrap();
    assert!(depths.dlq >= 1);
}

/// Invariant: an admitted request is observable in exactly one of the
/// local queue, global queue, in-flight set, or DLQ at every stage.
#[tokio::test]
async fn admitted_request_lives_in_exactly_one_place() {
    let queue_config = QueueConfig::builder()
        .instance_id("pod-inv")
        .max_local_depth(10)
        .build();
    let queue = Arc::new(TwoLevelQueue::new(queue_config, Arc::new(MemoryKv::new())));
    let scheduler = FairScheduler::new(
        SchedulerConfig::builder().max_in_flight(10).build(),
        Arc::clone(&queue),
        Arc::new(NullAuditSink),
    );

    let request = queued("r1", "acme", Tier::Starter, unix_now_ms());

    // Stage 1: queued locally.
    queue.enqueue(&request).await.unwrap();
    let depths = queue.depths().await.unwrap();
    let snapshot = scheduler.snapshot().await;
    assert_eq!(depths.pending() + depths.dlq + snapshot.total, 1);

    // Stage 2: in flight.
    let dispatched = scheduler.next().await.unwrap().unwrap();
    assert_eq!(dispatched.request_id, request.request_id);
    let depths = queue.depths().await.unwrap();
    let snapshot = scheduler.snapshot().await;
    assert_eq!(depths.pending() + depths.dlq, 0);
    assert_eq!(snapshot.total, 1);

    // Stage 3: completed, gone everywhere.
    scheduler.complete(&request.request_id).await.unwrap();
    let depths = queue.depths().await.unwrap();
    let snapshot = scheduler.snapshot().await;
    assert_eq!(depths.pending() + depths.dlq + snapshot.total, 0);

    // An expired request moves to the DLQ instead of dispatch or limbo.
    let mut stale = queued("r2", "acme", Tier::Starter, unix_now_ms());
    stale.deadline_at_ms = unix_now_ms().saturating_sub(1);
    queue.enqueue(&stale).await.unwrap();
    assert!(scheduler.next().await.unwrap().is_none());
    let depths = queue.depths().await.unwrap();
    let snapshot = scheduler.snapshot().await;
    assert_eq!(depths.pending(), 0);
    assert_eq!(depths.dlq, 1);
    assert_eq!(snapshot.total, 0);
}

/// Invariant: with saturating demand from every tier, steady-state
/// in-flight occupancy matches the fair shares.
#[tokio::test]
async fn saturating_demand_converges_to_fair_shares() {
    let queue_config = QueueConfig::builder()
        .instance_id("pod-fair")
        .max_local_depth(0)
        .max_global_depth(1000)
        .build();
    let queue = Arc::new(TwoLevelQueue::new(queue_config, Arc::new(MemoryKv::new())));
    let scheduler = FairScheduler::new(
        SchedulerConfig::builder().max_in_flight(40).build(),
        Arc::clone(&queue),
        Arc::new(NullAuditSink),
    );

    let base = unix_now_ms();
    for tier in Tier::ALL {
        for i in 0..30u64 {
            let id = format!("{}-{i}", tier.as_str());
            queue
                .enqueue(&queued(&id, &format!("{}-co", tier.as_str()), tier, base + i))
                .await
                .unwrap();
        }
    }

    while scheduler.next().await.unwrap().is_some() {}

    let snapshot = scheduler.snapshot().await;
    assert_eq!(snapshot.total, 40);
    // 50% / 30% / 15% / 5% of 40, floored.
    assert_eq!(snapshot.by_tier, [20, 12, 6, 2]);
}

#[tokio::test]
async fn dominant_tenant_raises_noisy_neighbor_alert() {
    let sink = Arc::new(CollectingSink::new());
    let queue_config = QueueConfig::builder()
        .instance_id("pod-noisy")
        .max_local_depth(0)
        .max_global_depth(100)
        .build();
    let queue = Arc::new(TwoLevelQueue::new(queue_config, Arc::new(MemoryKv::new())));
    let scheduler = FairScheduler::new(
        SchedulerConfig::builder().max_in_flight(10).build(),
        Arc::clone(&queue),
        Arc::clone(&sink) as Arc<dyn fairgate_core::AuditSink>,
    );

    let base = unix_now_ms();
    for i in 0..5u64 {
        queue
            .enqueue(&queued(&format!("r{i}"), "loud-co", Tier::Enterprise, base + i))
            .await
            .unwrap();
    }
    while scheduler.next().await.unwrap().is_some() {}

    // 5 of 10 slots is past the 30% alert threshold.
    assert_eq!(scheduler.noisy_neighbor_score(&TenantId::from("loud-co")).await, 0.5);
    assert!(sink.security_count(SecurityKind::NoisyNeighbor) >= 1);
}
