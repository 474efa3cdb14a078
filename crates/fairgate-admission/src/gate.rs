//! The admission gate: validation, rate limiting, quota, priority stamping.

use crate::bucket::{OperationClass, TokenBucket};
use crate::config::AdmissionConfig;
use crate::events::AdmissionEvent;
use crate::screen::InjectionScreen;
use fairgate_core::{
    quota_day, unix_now_ms, AuditSink, DependencyError, ErrorKind, KvStore, QueryPayload,
    QueuedRequest, RequestId, SecurityEvent, SecurityKind, TenantDirectory, TenantId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// An incoming request after authentication, before admission.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub tenant_id: TenantId,
    pub user_id: String,
    pub payload: QueryPayload,
}

/// Numbers for the `X-RateLimit-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which at least one token will be available again.
    pub reset_unix: u64,
}

/// A successful admission verdict.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub request: QueuedRequest,
    pub rate: RateLimitInfo,
}

/// Why a request was refused admission.
#[derive(Debug, Clone, Error)]
pub enum Rejection {
    #[error("tenant is not recognized")]
    Unauthenticated,

    #[error("rate limit exceeded; retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        rate: RateLimitInfo,
    },

    #[error("daily quota exhausted")]
    QuotaExhausted,

    #[error("query failed the injection screen")]
    InjectionSuspected { pattern: &'static str },

    #[error("both queue levels are at capacity")]
    QueueOverflow,

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Rejection::Unauthenticated => ErrorKind::Unauthenticated,
            Rejection::RateLimited { .. } => ErrorKind::RateLimited,
            Rejection::QuotaExhausted => ErrorKind::QuotaExhausted,
            Rejection::InjectionSuspected { .. } => ErrorKind::InjectionSuspected,
            Rejection::QueueOverflow => ErrorKind::QueueOverflow,
            Rejection::Dependency(err) => err.kind(),
        }
    }
}

/// Admission gate. One per instance; bucket state is single-instance
/// authoritative (bursts may modestly exceed the nominal rate across a
/// fleet), while daily quotas stay globally accurate through the shared
/// counter.
pub struct AdmissionGate {
    tenants: Arc<dyn TenantDirectory>,
    kv: Arc<dyn KvStore>,
    audit: Arc<dyn AuditSink>,
    screen: InjectionScreen,
    buckets: Mutex<HashMap<(TenantId, OperationClass), TokenBucket>>,
    config: AdmissionConfig,
}

impl AdmissionGate {
    pub fn new(
        config: AdmissionConfig,
        tenants: Arc<dyn TenantDirectory>,
        kv: Arc<dyn KvStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            tenants,
            kv,
            audit,
            screen: InjectionScreen::new(),
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Runs the full admission pipeline: tenant resolution, injection
    /// screen, token bucket, daily quota, priority and deadline stamping.
    pub async fn admit(&self, req: AdmissionRequest) -> Result<Admitted, Rejection> {
        let tenant = match self.tenants.get_tenant(&req.tenant_id).await? {
            Some(tenant) => tenant,
            None => {
                self.reject(&req.tenant_id, ErrorKind::Unauthenticated);
                return Err(Rejection::Unauthenticated);
            }
        };

        if let Some(pattern) = self.screen.matched(&req.payload.query) {
            tracing::warn!(
                tenant_id = %req.tenant_id,
                pattern,
                "prompt injection suspected"
            );
            self.audit.security(SecurityEvent {
                tenant_id: req.tenant_id.clone(),
                kind: SecurityKind::PromptInjection,
                detail: format!("pattern `{pattern}` matched"),
                anomaly_score: None,
                ts_ms: unix_now_ms(),
            });
            self.reject(&req.tenant_id, ErrorKind::InjectionSuspected);
            return Err(Rejection::InjectionSuspected { pattern });
        }

        let (acquired, rate, retry_after) = {
            let mut buckets = self.buckets.lock().unwrap();
            let bucket = buckets
                .entry((req.tenant_id.clone(), OperationClass::Query))
                .or_insert_with(|| TokenBucket::new(tenant.burst_qps, tenant.qps_limit));
            let acquired = bucket.try_acquire(1.0);
            let remaining = bucket.available().max(0.0).floor() as u64;
            let retry_after = bucket
                .time_until_available(1.0)
                .min(Duration::from_secs(24 * 60 * 60));
            let now_unix = unix_now_ms() / 1000;
            let reset_unix = if remaining > 0 {
                now_unix
            } else {
                now_unix + retry_after.as_secs_f64().ceil() as u64
            };
            let rate = RateLimitInfo {
                limit: bucket.capacity().floor() as u64,
                remaining,
                reset_unix,
            };
            (acquired, rate, retry_after)
        };

        if !acquired {
            self.reject(&req.tenant_id, ErrorKind::RateLimited);
            return Err(Rejection::RateLimited { retry_after, rate });
        }

        let now_ms = unix_now_ms();
        let quota_key = format!(
            "{}quota:{}:{}",
            self.config.key_prefix,
            req.tenant_id,
            quota_day(now_ms)
        );
        let used = self
            .kv
            .incr_with_expiry(&quota_key, self.config.quota_ttl)
            .await?;
        if used > tenant.daily_quota {
            self.reject(&req.tenant_id, ErrorKind::QuotaExhausted);
            return Err(Rejection::QuotaExhausted);
        }

        let request = QueuedRequest {
            request_id: RequestId::generate(),
            tenant_id: req.tenant_id.clone(),
            user_id: req.user_id,
            tier: tenant.tier,
            submitted_at_ms: now_ms,
            deadline_at_ms: now_ms + self.config.queue_timeout.as_millis() as u64,
            payload: req.payload,
        };

        self.config.event_listeners.emit(&AdmissionEvent::Admitted {
            tenant_id: req.tenant_id.clone(),
            tier: tenant.tier,
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "fairgate_admissions_total",
            "tier" => tenant.tier.as_str(),
            "outcome" => "admitted"
        )
        .increment(1);

        tracing::debug!(
            tenant_id = %req.tenant_id,
            request_id = %request.request_id,
            tier = tenant.tier.as_str(),
            "request admitted"
        );

        Ok(Admitted { request, rate })
    }

    fn reject(&self, tenant_id: &TenantId, kind: ErrorKind) {
        self.config.event_listeners.emit(&AdmissionEvent::Rejected {
            tenant_id: tenant_id.clone(),
            code: kind.code(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "fairgate_admissions_total",
            "tier" => "unknown",
            "outcome" => kind.code()
        )
        .increment(1);

        tracing::info!(
            tenant_id = %tenant_id,
            code = kind.code(),
            "request rejected at admission"
        );
    }
}
