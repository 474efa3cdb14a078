//! Caller-visible error taxonomy and dependency failure classification.

use thiserror::Error;

/// Every error code a caller of the platform can observe, with its
/// HTTP-equivalent status. The queue, scheduler, resilience, and pipeline
/// layers all collapse their failures into one of these kinds at the
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    QuotaExhausted,
    RateLimited,
    InjectionSuspected,
    QueueOverflow,
    DeadlineExceeded,
    CircuitOpen,
    CrossTenantLeakage,
    TransientDependency,
    PermanentDependency,
}

impl ErrorKind {
    /// The wire-level error code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::QuotaExhausted => "quota_exhausted",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::InjectionSuspected => "injection_suspected",
            ErrorKind::QueueOverflow => "queue_overflow",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::CrossTenantLeakage => "cross_tenant_leakage",
            ErrorKind::TransientDependency => "transient_dependency",
            ErrorKind::PermanentDependency => "permanent_dependency",
        }
    }

    /// The HTTP status the external framing layer should map this to.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::QuotaExhausted | ErrorKind::RateLimited => 429,
            ErrorKind::InjectionSuspected => 400,
            ErrorKind::QueueOverflow | ErrorKind::CircuitOpen => 503,
            ErrorKind::DeadlineExceeded => 504,
            ErrorKind::CrossTenantLeakage => 403,
            ErrorKind::TransientDependency => 502,
            ErrorKind::PermanentDependency => 500,
        }
    }

    /// Whether the caller may usefully retry after backing off.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::QueueOverflow
                | ErrorKind::CircuitOpen
                | ErrorKind::TransientDependency
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure of a call into an external dependency, classified the way the
/// retry policy needs it. Adapters classify their own wire errors; anything
/// an adapter cannot classify is treated as permanent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// Network-level, timeout, or 5xx-equivalent failure. Retried.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// Validation or other non-recoverable failure. Never retried.
    #[error("permanent dependency failure: {0}")]
    Permanent(String),

    /// The per-tenant circuit for this dependency is open.
    #[error("circuit is open; call not permitted")]
    CircuitOpen,

    /// The request's deadline elapsed before or during the call.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl DependencyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DependencyError::Transient(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DependencyError::Transient(_) => ErrorKind::TransientDependency,
            DependencyError::Permanent(_) => ErrorKind::PermanentDependency,
            DependencyError::CircuitOpen => ErrorKind::CircuitOpen,
            DependencyError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }
}

/// Terminal failure of a dispatched request, as reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProcessFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProcessFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded, "request deadline elapsed")
    }
}

impl From<DependencyError> for ProcessFailure {
    fn from(err: DependencyError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_statuses() {
        assert_eq!(ErrorKind::RateLimited.code(), "rate_limited");
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
        assert_eq!(ErrorKind::CrossTenantLeakage.http_status(), 403);
        assert_eq!(ErrorKind::DeadlineExceeded.http_status(), 504);
        assert_eq!(ErrorKind::QueueOverflow.http_status(), 503);
    }

    #[test]
    fn only_transient_errors_are_retryable_dependencies() {
        assert!(DependencyError::Transient("io".into()).is_transient());
        assert!(!DependencyError::Permanent("bad request".into()).is_transient());
        assert!(!DependencyError::CircuitOpen.is_transient());
        assert!(!DependencyError::DeadlineExceeded.is_transient());
    }
}
