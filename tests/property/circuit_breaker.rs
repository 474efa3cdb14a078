//! Properties of the per-tenant circuit breaker.
//!
//! Invariants tested:
//! - After `fail_max` consecutive failures, the next call short-circuits
//!   without invoking the adapter
//! - Failure streaks shorter than `fail_max` never open the circuit

use super::paused_rt;
use fairgate_core::{DependencyError, TenantId};
use fairgate_resilience::{CircuitBreaker, CircuitState};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn breaker(fail_max: usize) -> CircuitBreaker {
    CircuitBreaker::builder()
        .name("prop")
        .fail_max(fail_max)
        .reset_timeout(Duration::from_secs(3600))
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn short_circuits_exactly_after_fail_max(
        fail_max in 1usize..10,
        extra_calls in 1usize..5,
    ) {
        let rt = paused_rt();
        rt.block_on(async {
            let breaker = breaker(fail_max);
            let tenant = TenantId::from("prop-tenant");
            let invoked = Arc::new(AtomicUsize::new(0));

            for _ in 0..fail_max {
                let invoked = Arc::clone(&invoked);
                let _: Result<(), _> = breaker
                    .call(&tenant, || async move {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        Err(DependencyError::Transient("boom".into()))
                    })
                    .await;
            }
            prop_assert_eq!(breaker.state(&tenant), CircuitState::Open);

            for _ in 0..extra_calls {
                let invoked = Arc::clone(&invoked);
                let result: Result<(), _> = breaker
                    .call(&tenant, || async move {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
                prop_assert_eq!(result, Err(DependencyError::CircuitOpen));
            }
            prop_assert_eq!(invoked.load(Ordering::SeqCst), fail_max);
            Ok(())
        })?;
    }

    #[test]
    fn interrupted_streaks_never_open_the_circuit(
        fail_max in 2usize..10,
        rounds in 1usize..8,
    ) {
        let rt = paused_rt();
        rt.block_on(async {
            let breaker = breaker(fail_max);
            let tenant = TenantId::from("prop-tenant");

            for _ in 0..rounds {
                // A streak one short of the threshold, then a success.
                for _ in 0..fail_max - 1 {
                    let _: Result<(), _> = breaker
                        .call(&tenant, || async {
                            Err(DependencyError::Transient("boom".into()))
                        })
                        .await;
                }
                let ok = breaker.call(&tenant, || async { Ok(()) }).await;
                prop_assert_eq!(ok, Ok(()));
                prop_assert_eq!(breaker.state(&tenant), CircuitState::Closed);
            }
            Ok(())
        })?;
    }
}
