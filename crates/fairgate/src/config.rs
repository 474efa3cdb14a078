//! The single canonical configuration surface for a fairgate instance.

use fairgate_admission::AdmissionConfig;
use fairgate_cache::CacheConfig;
use fairgate_pipeline::{BehaviorConfig, PipelineConfig, PipelineGuards};
use fairgate_queue::QueueConfig;
use fairgate_resilience::{CircuitBreaker, Resilient, RetryPolicy};
use fairgate_scheduler::{SchedulerConfig, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Everything a [`crate::Runtime`] needs, with production defaults.
/// Environment variables prefixed `FAIRGATE_` override individual fields
/// through [`PlatformConfig::from_env`].
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Instance identifier; `None` generates `pod-<random>`.
    pub instance_id: Option<String>,
    /// Namespace prefix for every key in the shared store.
    pub key_prefix: String,

    pub max_queue_depth: usize,
    pub max_global_depth: usize,
    pub queue_timeout: Duration,
    pub sweep_interval: Duration,

    pub max_in_flight: usize,
    pub worker_pool_size: usize,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,

    pub breaker_fail_max: usize,
    pub breaker_reset_timeout: Duration,
    pub retry_max_attempts: usize,
    pub retry_base: Duration,
    pub retry_max_wait: Duration,

    pub bm25_weight: f64,
    pub vector_weight: f64,
    pub min_score: f64,
    pub top_k: usize,
    pub retrieval_patience: Duration,
    pub retrieval_cache_ttl: Duration,
    pub cache_ttl: Duration,

    pub llm_cost_per_1k_tokens: f64,
    pub retrieval_cost_per_query: f64,
    pub compute_cost_per_second: f64,
    pub target_latency_p95: Option<Duration>,

    pub pii_redaction_enabled: bool,
    pub behavior: BehaviorConfig,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            key_prefix: String::from("genai:"),
            max_queue_depth: 100,
            max_global_depth: 100,
            queue_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            max_in_flight: 50,
            worker_pool_size: 10,
            poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(120),
            breaker_fail_max: 5,
            breaker_reset_timeout: Duration::from_secs(60),
            retry_max_attempts: 3,
            retry_base: Duration::from_secs(1),
            retry_max_wait: Duration::from_secs(10),
            bm25_weight: 0.4,
            vector_weight: 0.6,
            min_score: 0.3,
            top_k: 5,
            retrieval_patience: Duration::from_millis(250),
            retrieval_cache_ttl: Duration::from_secs(3600),
            cache_ttl: Duration::from_secs(3600),
            llm_cost_per_1k_tokens: 0.03,
            retrieval_cost_per_query: 0.001,
            compute_cost_per_second: 0.001,
            target_latency_p95: Some(Duration::from_secs(2)),
            pii_redaction_enabled: true,
            behavior: BehaviorConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

impl PlatformConfig {
    /// Defaults with `FAIRGATE_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(id) = std::env::var("FAIRGATE_INSTANCE_ID") {
            config.instance_id = Some(id);
        }
        if let Ok(prefix) = std::env::var("FAIRGATE_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(depth) = env_parse("FAIRGATE_MAX_QUEUE_DEPTH") {
            config.max_queue_depth = depth;
            config.max_global_depth = depth;
        }
        if let Some(timeout) = env_secs("FAIRGATE_QUEUE_TIMEOUT_SEC") {
            config.queue_timeout = timeout;
        }
        if let Some(max) = env_parse("FAIRGATE_MAX_INFLIGHT") {
            config.max_in_flight = max;
        }
        if let Some(size) = env_parse("FAIRGATE_WORKER_POOL_SIZE") {
            config.worker_pool_size = size;
        }
        if let Some(fail_max) = env_parse("FAIRGATE_BREAKER_FAIL_MAX") {
            config.breaker_fail_max = fail_max;
        }
        if let Some(reset) = env_secs("FAIRGATE_BREAKER_RESET_SEC") {
            config.breaker_reset_timeout = reset;
        }
        if let Some(attempts) = env_parse("FAIRGATE_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = attempts;
        }
        if let Some(grace) = env_secs("FAIRGATE_SHUTDOWN_GRACE_SEC") {
            config.shutdown_grace = grace;
        }
        if let Some(enabled) = env_parse("FAIRGATE_PII_REDACTION_ENABLED") {
            config.pii_redaction_enabled = enabled;
        }
        config
    }

    pub(crate) fn admission(&self) -> AdmissionConfig {
        AdmissionConfig::builder()
            .key_prefix(self.key_prefix.clone())
            .queue_timeout(self.queue_timeout)
            .build()
    }

    pub(crate) fn queue(&self) -> QueueConfig {
        let mut builder = QueueConfig::builder()
            .key_prefix(self.key_prefix.clone())
            .max_local_depth(self.max_queue_depth)
            .max_global_depth(self.max_global_depth);
        if let Some(id) = &self.instance_id {
            builder = builder.instance_id(id.clone());
        }
        builder.build()
    }

    pub(crate) fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::builder()
            .max_in_flight(self.max_in_flight)
            .poll_interval(self.poll_interval)
            .build()
    }

    pub(crate) fn worker(&self) -> WorkerConfig {
        WorkerConfig::builder()
            .pool_size(self.worker_pool_size)
            .shutdown_grace(self.shutdown_grace)
            .compute_cost_per_second(self.compute_cost_per_second)
            .target_latency_p95(self.target_latency_p95)
            .build()
    }

    pub(crate) fn cache(&self) -> CacheConfig {
        CacheConfig {
            namespace: format!("{}cache:", self.key_prefix),
            default_ttl: self.cache_ttl,
        }
    }

    pub(crate) fn pipeline(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .bm25_weight(self.bm25_weight)
            .vector_weight(self.vector_weight)
            .min_score(self.min_score)
            .top_k(self.top_k)
            .patience(self.retrieval_patience)
            .retrieval_cache_ttl(self.retrieval_cache_ttl)
            .llm_cost_per_1k_tokens(self.llm_cost_per_1k_tokens)
            .retrieval_cost_per_query(self.retrieval_cost_per_query)
            .pii_redaction_enabled(self.pii_redaction_enabled)
            .behavior(self.behavior.clone())
            .build()
    }

    pub(crate) fn guards(&self) -> PipelineGuards {
        let breaker = |name: &str| {
            Arc::new(
                CircuitBreaker::builder()
                    .name(name)
                    .fail_max(self.breaker_fail_max)
                    .reset_timeout(self.breaker_reset_timeout)
                    .build(),
            )
        };
        let retry = |name: &str| {
            RetryPolicy::builder()
                .name(name)
                .max_attempts(self.retry_max_attempts)
                .exponential_backoff(self.retry_base)
                .max_wait(self.retry_max_wait)
                .build()
        };
        PipelineGuards {
            bm25: Resilient::new(breaker("bm25_search"), retry("bm25_search")),
            vector: Resilient::new(breaker("vector_store"), retry("vector_store")),
            llm: Resilient::new(breaker("llm_service"), retry("llm_service")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = PlatformConfig::default();
        assert_eq!(config.max_in_flight, 50);
        assert_eq!(config.worker_pool_size, 10);
        assert_eq!(config.max_queue_depth, 100);
        assert_eq!(config.queue_timeout, Duration::from_secs(30));
        assert_eq!(config.breaker_fail_max, 5);
        assert_eq!(config.breaker_reset_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_max_attempts, 3);
    }
}
