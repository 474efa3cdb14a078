//! Properties of two-level queue placement.
//!
//! Invariants tested:
//! - Every accepted request sits in exactly one level; overflow accepts
//!   nothing
//! - Draining returns every accepted request exactly once

use super::rt;
use fairgate_core::{unix_now_ms, MemoryKv, QueryPayload, QueuedRequest, RequestId, TenantId, Tier};
use fairgate_queue::{EnqueueError, QueueConfig, TwoLevelQueue};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashSet;
use std::sync::Arc;

fn request(index: usize, tier: Tier) -> QueuedRequest {
    let now = unix_now_ms();
    QueuedRequest {
        request_id: RequestId::new(format!("r{index}")),
        tenant_id: TenantId::from("prop-tenant"),
        user_id: "u1".to_string(),
        tier,
        submitted_at_ms: now + index as u64,
        deadline_at_ms: now + 600_000,
        payload: QueryPayload::text("q"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn accepted_requests_live_in_exactly_one_level(
        local_cap in 0usize..8,
        global_cap in 1usize..8,
        tiers in prop::collection::vec(0u8..4, 1..24),
    ) {
        let rt = rt();
        rt.block_on(async {
            let config = QueueConfig::builder()
                .instance_id("pod-prop")
                .max_local_depth(local_cap)
                .max_global_depth(global_cap)
                .build();
            let queue = TwoLevelQueue::new(config, Arc::new(MemoryKv::new()));

            let mut accepted = 0usize;
            for (index, tier_priority) in tiers.iter().enumerate() {
                let tier = Tier::from_priority(*tier_priority).expect("valid priority");
                match queue.enqueue(&request(index, tier)).await {
                    Ok(_) => accepted += 1,
                    Err(EnqueueError::Overflow) => {}
                    Err(other) => return Err(TestCaseError::fail(other.to_string())),
                }
            }

            let depths = queue.depths().await.map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(depths.local + depths.global, accepted);
            prop_assert!(depths.local <= local_cap);
            prop_assert!(depths.global <= global_cap);
            prop_assert_eq!(depths.dlq, 0);

            let mut drained = HashSet::new();
            while let Some(request) = queue
                .dequeue()
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?
            {
                prop_assert!(
                    drained.insert(request.request_id.to_string()),
                    "request dequeued twice"
                );
            }
            prop_assert_eq!(drained.len(), accepted);
            Ok(())
        })?;
    }

    #[test]
    fn global_level_drains_in_tier_then_arrival_order(
        tiers in prop::collection::vec(0u8..4, 2..20),
    ) {
        let rt = rt();
        rt.block_on(async {
            // Local disabled: everything lands in the global priority set.
            let config = QueueConfig::builder()
                .instance_id("pod-prop")
                .max_local_depth(0)
                .max_global_depth(100)
                .build();
            let queue = TwoLevelQueue::new(config, Arc::new(MemoryKv::new()));

            for (index, tier_priority) in tiers.iter().enumerate() {
                let tier = Tier::from_priority(*tier_priority).expect("valid priority");
                queue
                    .enqueue(&request(index, tier))
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let mut drained = Vec::new();
            while let Some(request) = queue
                .dequeue()
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?
            {
                drained.push((request.tier.priority(), request.submitted_at_ms));
            }

            let mut sorted = drained.clone();
            sorted.sort();
            prop_assert_eq!(drained, sorted);
            Ok(())
        })?;
    }
}
