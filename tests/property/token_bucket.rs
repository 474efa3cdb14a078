//! Properties of the continuous-refill token bucket.
//!
//! Invariants tested:
//! - Refill over an idle window adds exactly `min(capacity − tokens,
//!   rate × Δt)`
//! - Token balance never leaves `[0, capacity]`

use super::paused_rt;
use fairgate_admission::TokenBucket;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn idle_refill_matches_rate_times_elapsed(
        capacity in 1.0f64..100.0,
        rate in 0.1f64..50.0,
        drained_fraction in 0.0f64..1.0,
        elapsed_ms in 1u64..10_000,
    ) {
        let rt = paused_rt();
        rt.block_on(async {
            let mut bucket = TokenBucket::new(capacity, rate);
            prop_assert!(bucket.try_acquire(capacity * drained_fraction));
            let before = bucket.available();

            tokio::time::advance(Duration::from_millis(elapsed_ms)).await;

            let after = bucket.available();
            let expected = (rate * elapsed_ms as f64 / 1000.0).min(capacity - before);
            prop_assert!(
                (after - before - expected).abs() < 1e-6,
                "refilled {} but expected {}",
                after - before,
                expected
            );
            Ok(())
        })?;
    }

    #[test]
    fn balance_stays_within_bounds(
        capacity in 1.0f64..50.0,
        rate in 0.1f64..20.0,
        ops in prop::collection::vec((0.0f64..5.0, 0u64..2_000), 1..40),
    ) {
        let rt = paused_rt();
        rt.block_on(async {
            let mut bucket = TokenBucket::new(capacity, rate);
            for (permits, advance_ms) in ops {
                let _ = bucket.try_acquire(permits);
                tokio::time::advance(Duration::from_millis(advance_ms)).await;
                let available = bucket.available();
                prop_assert!(available >= 0.0, "balance went negative: {available}");
                prop_assert!(
                    available <= capacity + 1e-9,
                    "balance exceeded capacity: {available} > {capacity}"
                );
            }
            Ok(())
        })?;
    }

    #[test]
    fn denied_acquisitions_do_not_spend_tokens(
        capacity in 1.0f64..20.0,
        rate in 0.0f64..0.001,
    ) {
        let rt = paused_rt();
        rt.block_on(async {
            let mut bucket = TokenBucket::new(capacity, rate);
            prop_assert!(bucket.try_acquire(capacity));
            let before = bucket.available();
            prop_assert!(!bucket.try_acquire(1.0));
            prop_assert!((bucket.available() - before).abs() < 1e-9);
            Ok(())
        })?;
    }
}
