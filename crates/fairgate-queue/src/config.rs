use crate::events::QueueEvent;
use fairgate_core::events::EventListeners;

/// Configuration for the two-level queue.
pub struct QueueConfig {
    pub(crate) instance_id: String,
    pub(crate) key_prefix: String,
    pub(crate) max_local_depth: usize,
    pub(crate) max_global_depth: usize,
    pub(crate) event_listeners: EventListeners<QueueEvent>,
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::new()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`QueueConfig`].
pub struct QueueConfigBuilder {
    instance_id: Option<String>,
    key_prefix: String,
    max_local_depth: usize,
    max_global_depth: Option<usize>,
    event_listeners: EventListeners<QueueEvent>,
}

impl QueueConfigBuilder {
    pub fn new() -> Self {
        Self {
            instance_id: None,
            key_prefix: String::from("genai:"),
            max_local_depth: 100,
            max_global_depth: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Identifier of this instance, used in the local-queue key.
    ///
    /// Default: `pod-<random>`
    pub fn instance_id<I: Into<String>>(mut self, id: I) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Namespace prefix for every queue key.
    ///
    /// Default: `genai:`
    pub fn key_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Capacity of the instance-local FIFO.
    ///
    /// Default: 100
    pub fn max_local_depth(mut self, depth: usize) -> Self {
        self.max_local_depth = depth;
        self
    }

    /// Capacity of the shared global priority set.
    ///
    /// Default: same as `max_local_depth`
    pub fn max_global_depth(mut self, depth: usize) -> Self {
        self.max_global_depth = Some(depth);
        self
    }

    /// Register an event listener on queue activity.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: fairgate_core::EventListener<QueueEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    pub fn build(self) -> QueueConfig {
        let instance_id = self.instance_id.unwrap_or_else(|| {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("pod-{}", &suffix[..8])
        });
        QueueConfig {
            instance_id,
            key_prefix: self.key_prefix,
            max_local_depth: self.max_local_depth,
            max_global_depth: self.max_global_depth.unwrap_or(self.max_local_depth),
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
