//! Per-tenant resilience for fairgate's external dependencies.
//!
//! Each dependency (LLM, retrieval, vector store, KV) is guarded by a
//! [`CircuitBreaker`] holding an independent circuit per tenant, wrapped by
//! a deadline-aware [`RetryPolicy`]. The composition order is fixed:
//! retry around breaker around the raw call, so a short-circuited call is
//! never retried and every attempt is metered by the breaker.
//!
//! ## States
//! - **Closed**: calls pass; consecutive failures are counted
//! - **Open**: calls are rejected for `reset_timeout`
//! - **HalfOpen**: a single probe goes out; success closes the circuit,
//!   failure reopens it
//!
//! ## Example
//!
//! ```rust
//! use fairgate_resilience::{CircuitBreaker, Resilient, RetryPolicy};
//! use fairgate_core::{DependencyError, TenantId};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), DependencyError> {
//! let breaker = Arc::new(
//!     CircuitBreaker::builder()
//!         .name("llm")
//!         .fail_max(5)
//!         .reset_timeout(Duration::from_secs(60))
//!         .build(),
//! );
//! let retry = RetryPolicy::builder()
//!     .name("llm")
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .build();
//! let guard = Resilient::new(breaker, retry);
//!
//! let tenant = TenantId::from("acme");
//! let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
//! let answer = guard
//!     .call(&tenant, deadline, || async { Ok::<_, DependencyError>(42) })
//!     .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

mod breaker;
mod circuit;
mod config;
pub mod events;

pub use breaker::CircuitBreaker;
pub use circuit::CircuitState;
pub use config::{BreakerConfig, BreakerConfigBuilder, RetryPolicy, RetryPolicyBuilder};
pub use events::{BreakerEvent, RetryEvent};

use fairgate_core::{DependencyError, TenantId};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Fixed `Retry(Breaker(raw))` composition over one dependency.
///
/// Every attempt runs under the request deadline; only transient failures
/// are retried, and a retry is only scheduled when its backoff still fits
/// inside the deadline. Once the deadline cannot accommodate another
/// attempt, the deadline error wins over retry exhaustion.
pub struct Resilient {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl Resilient {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        Self { breaker, retry }
    }

    /// The breaker guarding this dependency.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Calls `op` for the given tenant under the composed policy. `op` is
    /// invoked once per attempt and must produce a fresh future each time.
    pub async fn call<T, F, Fut>(
        &self,
        tenant_id: &TenantId,
        deadline: Instant,
        op: F,
    ) -> Result<T, DependencyError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let mut attempt = 1usize;
        loop {
            if Instant::now() >= deadline {
                return Err(DependencyError::DeadlineExceeded);
            }

            let outcome = self
                .breaker
                .call(tenant_id, || {
                    let attempt_fut = op();
                    async move {
                        match tokio::time::timeout_at(deadline, attempt_fut).await {
                            Ok(result) => result,
                            Err(_) => Err(DependencyError::DeadlineExceeded),
                        }
                    }
                })
                .await;

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            // Circuit-open, permanent, and deadline errors are terminal.
            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= self.retry.max_attempts {
                self.retry
                    .event_listeners
                    .emit(&RetryEvent::AttemptsExhausted {
                        name: self.retry.name.clone(),
                        timestamp: std::time::Instant::now(),
                        attempts: attempt,
                    });

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "fairgate_retry_exhausted_total",
                    "policy" => self.retry.name.clone()
                )
                .increment(1);

                return Err(err);
            }

            let delay = self.retry.backoff(attempt);
            if Instant::now() + delay >= deadline {
                return Err(DependencyError::DeadlineExceeded);
            }

            self.retry
                .event_listeners
                .emit(&RetryEvent::AttemptScheduled {
                    name: self.retry.name.clone(),
                    timestamp: std::time::Instant::now(),
                    attempt: attempt + 1,
                    delay,
                });
            tracing::debug!(
                policy = %self.retry.name,
                tenant_id = %tenant_id,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying transient dependency failure"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn guard(max_attempts: usize) -> Resilient {
        let breaker = Arc::new(
            CircuitBreaker::builder()
                .name("dep")
                .fail_max(50)
                .reset_timeout(Duration::from_secs(60))
                .build(),
        );
        let retry = RetryPolicy::builder()
            .name("dep")
            .max_attempts(max_attempts)
            .exponential_backoff(Duration::from_millis(10))
            .max_wait(Duration::from_millis(40))
            .build();
        Resilient::new(breaker, retry)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let guard = guard(3);
        let tenant = TenantId::from("acme");
        let calls = Arc::new(AtomicUsize::new(0));

        let deadline = Instant::now() + Duration::from_secs(5);
        let calls_ref = Arc::clone(&calls);
        let result = guard
            .call(&tenant, deadline, move || {
                let calls = Arc::clone(&calls_ref);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DependencyError::Transient("flaky".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let guard = guard(3);
        let tenant = TenantId::from("acme");
        let calls = Arc::new(AtomicUsize::new(0));

        let deadline = Instant::now() + Duration::from_secs(5);
        let calls_ref = Arc::clone(&calls);
        let result: Result<(), _> = guard
            .call(&tenant, deadline, move || {
                let calls = Arc::clone(&calls_ref);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DependencyError::Permanent("bad request".into()))
                }
            })
            .await;

        assert_eq!(result, Err(DependencyError::Permanent("bad request".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_over_retry_exhaustion() {
        let guard = guard(5);
        let tenant = TenantId::from("acme");
        let calls = Arc::new(AtomicUsize::new(0));

        // Each attempt takes 300ms against a 500ms deadline: one initial
        // call, one retry, then the deadline cuts the second attempt short.
        let deadline = Instant::now() + Duration::from_millis(500);
        let calls_ref = Arc::clone(&calls);
        let result: Result<(), _> = guard
            .call(&tenant, deadline, move || {
                let calls = Arc::clone(&calls_ref);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Err(DependencyError::Transient("slow".into()))
                }
            })
            .await;

        assert_eq!(result, Err(DependencyError::DeadlineExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_is_not_retried() {
        let guard = guard(3);
        let tenant = TenantId::from("acme");

        // Trip the breaker directly.
        for _ in 0..50 {
            let _: Result<(), _> = guard
                .breaker()
                .call(&tenant, || async { Err(DependencyError::Transient("x".into())) })
                .await;
        }
        assert_eq!(guard.breaker().state(&tenant), CircuitState::Open);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_ref = Arc::clone(&calls);
        let deadline = Instant::now() + Duration::from_secs(5);
        let result: Result<(), _> = guard
            .call(&tenant, deadline, move || {
                let calls = Arc::clone(&calls_ref);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(result, Err(DependencyError::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
