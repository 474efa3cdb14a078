use crate::events::AdmissionEvent;
use fairgate_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the admission gate.
pub struct AdmissionConfig {
    pub(crate) key_prefix: String,
    pub(crate) queue_timeout: Duration,
    pub(crate) quota_ttl: Duration,
    pub(crate) event_listeners: EventListeners<AdmissionEvent>,
}

impl AdmissionConfig {
    pub fn builder() -> AdmissionConfigBuilder {
        AdmissionConfigBuilder::new()
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`AdmissionConfig`].
pub struct AdmissionConfigBuilder {
    key_prefix: String,
    queue_timeout: Duration,
    quota_ttl: Duration,
    event_listeners: EventListeners<AdmissionEvent>,
}

impl AdmissionConfigBuilder {
    pub fn new() -> Self {
        Self {
            key_prefix: String::from("genai:"),
            queue_timeout: Duration::from_secs(30),
            quota_ttl: Duration::from_secs(24 * 60 * 60),
            event_listeners: EventListeners::new(),
        }
    }

    /// Namespace prefix for quota keys in the shared store.
    ///
    /// Default: `genai:`
    pub fn key_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// How long an admitted request may sit in the queue before its
    /// deadline; stamped as `deadline_at = now + queue_timeout`.
    ///
    /// Default: 30 seconds
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// TTL on daily-quota counters.
    ///
    /// Default: 24 hours
    pub fn quota_ttl(mut self, ttl: Duration) -> Self {
        self.quota_ttl = ttl;
        self
    }

    /// Register a callback for rejected admissions.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &AdmissionEvent| {
                if let AdmissionEvent::Rejected { code, .. } = event {
                    f(code);
                }
            }));
        self
    }

    pub fn build(self) -> AdmissionConfig {
        AdmissionConfig {
            key_prefix: self.key_prefix,
            queue_timeout: self.queue_timeout,
            quota_ttl: self.quota_ttl,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for AdmissionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
