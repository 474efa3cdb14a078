//! Continuous-refill token bucket.

use std::time::Duration;
use tokio::time::Instant;

/// The class of operation a bucket meters. Buckets are keyed per
/// `(tenant, operation class)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Query,
}

impl OperationClass {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationClass::Query => "query",
        }
    }
}

/// Token bucket with continuous refill: fractional tokens accumulate at
/// `refill_rate` per second up to `capacity`. Refill arithmetic is pure and
/// never suspends; callers serialize access per tenant.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket. `capacity` is the burst allowance, `refill_rate` the
    /// sustained tokens-per-second rate.
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            refill_rate: refill_rate.max(0.0),
            tokens: capacity.max(0.0),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to consume `permits` tokens, refilling first.
    pub fn try_acquire(&mut self, permits: f64) -> bool {
        self.refill(Instant::now());
        if self.tokens >= permits {
            self.tokens -= permits;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill.
    pub fn available(&mut self) -> f64 {
        self.refill(Instant::now());
        self.tokens
    }

    /// How long until `permits` tokens will be available at the sustained
    /// rate, assuming no admissions in between.
    pub fn time_until_available(&self, permits: f64) -> Duration {
        let deficit = permits - self.tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64(deficit / self.refill_rate)
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
