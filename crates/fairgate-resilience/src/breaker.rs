use crate::circuit::{Acquire, Circuit, CircuitState};
use crate::config::BreakerConfig;
use fairgate_core::{DependencyError, TenantId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// A named circuit breaker guarding one external dependency, holding an
/// independent [`CircuitState`] per tenant. Circuits are created lazily on a
/// tenant's first call.
///
/// The tenant map is locked only around the pure state-machine updates; the
/// guarded call itself runs without holding any lock.
pub struct CircuitBreaker {
    config: BreakerConfig,
    tenants: Mutex<HashMap<TenantId, Circuit>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a builder for a breaker.
    pub fn builder() -> crate::config::BreakerConfigBuilder {
        BreakerConfig::builder()
    }

    /// The dependency name this breaker guards.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current state of a tenant's circuit. Tenants that have never called
    /// are closed.
    pub fn state(&self, tenant_id: &TenantId) -> CircuitState {
        let tenants = self.tenants.lock().unwrap();
        tenants
            .get(tenant_id)
            .map_or(CircuitState::Closed, Circuit::state)
    }

    /// Forces a tenant's circuit back to closed.
    pub fn reset(&self, tenant_id: &TenantId) {
        let mut tenants = self.tenants.lock().unwrap();
        if let Some(circuit) = tenants.get_mut(tenant_id) {
            circuit.reset(&self.config, tenant_id);
        }
    }

    /// Runs `f` under the tenant's circuit. Short-circuits with
    /// [`DependencyError::CircuitOpen`] when the circuit is open, records
    /// the outcome otherwise.
    pub async fn call<T, F, Fut>(&self, tenant_id: &TenantId, f: F) -> Result<T, DependencyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let acquire = {
            let mut tenants = self.tenants.lock().unwrap();
            let circuit = tenants.entry(tenant_id.clone()).or_default();
            circuit.try_acquire(&self.config, tenant_id)
        };

        if acquire == Acquire::Rejected {
            return Err(DependencyError::CircuitOpen);
        }

        let result = f().await;

        {
            let mut tenants = self.tenants.lock().unwrap();
            if let Some(circuit) = tenants.get_mut(tenant_id) {
                match &result {
                    Ok(_) => circuit.record_success(&self.config, tenant_id),
                    Err(_) => circuit.record_failure(&self.config, tenant_id),
                }
            }
        }

        result
    }
}
