//! The two-level queue: instance-local FIFO backed by a shared priority
//! set, with a dead-letter list for expired items.

use crate::config::QueueConfig;
use crate::events::{QueueEvent, QueueLevel};
use fairgate_core::{DependencyError, KvStore, QueuedRequest, RequestId, Tier};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Failures observed by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Kv(#[from] DependencyError),

    #[error("queued payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures observed by `enqueue` specifically.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// Both levels are at capacity; the caller surfaces `queue_overflow`.
    #[error("both queue levels are at capacity")]
    Overflow,

    #[error(transparent)]
    Kv(#[from] DependencyError),

    #[error("request could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where an enqueue landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub level: QueueLevel,
    pub depth: usize,
}

/// Current depths of the three lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepths {
    pub local: usize,
    pub global: usize,
    pub dlq: usize,
}

impl QueueDepths {
    pub fn pending(&self) -> usize {
        self.local + self.global
    }
}

/// Two-level queue over the shared key-value store.
///
/// The local level is a strict FIFO list scoped to this instance; the
/// global level is a priority set shared across instances, scored by
/// `tier_priority × 1e9 + submitted_at_seconds`. Enqueue fills local first;
/// dequeue drains local first. Within a tier the global set preserves
/// submission order because arrival time breaks score ties.
pub struct TwoLevelQueue {
    kv: Arc<dyn KvStore>,
    config: QueueConfig,
    local_key: String,
    global_key: String,
    dlq_key: String,
}

impl TwoLevelQueue {
    pub fn new(config: QueueConfig, kv: Arc<dyn KvStore>) -> Self {
        let local_key = format!(
            "{}queue:local:{}",
            config.key_prefix,
            config.instance_id()
        );
        let global_key = format!("{}queue:global:priority", config.key_prefix);
        let dlq_key = format!("{}queue:dlq", config.key_prefix);
        Self {
            kv,
            config,
            local_key,
            global_key,
            dlq_key,
        }
    }

    pub fn instance_id(&self) -> &str {
        self.config.instance_id()
    }

    /// Enqueues an admitted request: local FIFO while it has room, then the
    /// global priority set, then `Overflow`.
    pub async fn enqueue(&self, request: &QueuedRequest) -> Result<Enqueued, EnqueueError> {
        let body = serde_json::to_string(request)?;

        let local_depth = self.kv.list_len(&self.local_key).await?;
        if local_depth < self.config.max_local_depth {
            self.kv.list_push_back(&self.local_key, body).await?;
            let depth = local_depth + 1;
            self.record_enqueue(&request.request_id, QueueLevel::Local, depth);
            return Ok(Enqueued {
                level: QueueLevel::Local,
                depth,
            });
        }

        let global_depth = self.kv.zset_len(&self.global_key).await?;
        if global_depth >= self.config.max_global_depth {
            self.config.event_listeners.emit(&QueueEvent::Overflowed {
                request_id: request.request_id.clone(),
                timestamp: Instant::now(),
            });

            #[cfg(feature = "metrics")]
            metrics::counter!("fairgate_queue_overflow_total").increment(1);

            tracing::warn!(
                request_id = %request.request_id,
                "queue overflow: local and global levels full"
            );
            return Err(EnqueueError::Overflow);
        }

        self.kv
            .zset_add(&self.global_key, body, request.priority_score())
            .await?;
        let depth = global_depth + 1;
        self.record_enqueue(&request.request_id, QueueLevel::Global, depth);

        if depth * 10 > self.config.max_global_depth * 8 {
            self.config.event_listeners.emit(&QueueEvent::NearCapacity {
                depth,
                capacity: self.config.max_global_depth,
                timestamp: Instant::now(),
            });
            tracing::warn!(
                depth,
                capacity = self.config.max_global_depth,
                "global queue approaching capacity"
            );
        }

        Ok(Enqueued {
            level: QueueLevel::Global,
            depth,
        })
    }

    /// Dequeues the next request: local head first (cheap, preserves
    /// locality), then the minimum-score member of the global set.
    pub async fn dequeue(&self) -> Result<Option<QueuedRequest>, QueueError> {
        if let Some(body) = self.kv.list_pop_front(&self.local_key).await? {
            return Ok(Some(serde_json::from_str(&body)?));
        }
        if let Some(body) = self.kv.zset_pop_min(&self.global_key).await? {
            return Ok(Some(serde_json::from_str(&body)?));
        }
        Ok(None)
    }

    /// Dequeues the next request of a specific tier, if one is available:
    /// the local head when it matches (local stays strict FIFO), otherwise
    /// the oldest global member within the tier's score band.
    pub async fn dequeue_tier(&self, tier: Tier) -> Result<Option<QueuedRequest>, QueueError> {
        if let Some(body) = self.kv.list_front(&self.local_key).await? {
            let head: QueuedRequest = serde_json::from_str(&body)?;
            if head.tier == tier {
                if let Some(body) = self.kv.list_pop_front(&self.local_key).await? {
                    return Ok(Some(serde_json::from_str(&body)?));
                }
            }
        }

        let band_start = f64::from(tier.priority()) * 1e9;
        let band_end = band_start + 1e9;
        if let Some(body) = self
            .kv
            .zset_pop_min_in_range(&self.global_key, band_start, band_end)
            .await?
        {
            return Ok(Some(serde_json::from_str(&body)?));
        }
        Ok(None)
    }

    /// Appends a request to the dead-letter list.
    pub async fn push_dlq(&self, request: &QueuedRequest) -> Result<(), EnqueueError> {
        let body = serde_json::to_string(request)?;
        self.kv.list_push_back(&self.dlq_key, body).await?;
        self.config.event_listeners.emit(&QueueEvent::SweptToDlq {
            request_id: request.request_id.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("fairgate_queue_dlq_total").increment(1);

        Ok(())
    }

    /// Walks both levels and moves every request whose deadline has passed
    /// into the DLQ. Returns the expired ids.
    pub async fn sweep_expired(&self, now_ms: u64) -> Result<Vec<RequestId>, QueueError> {
        let mut expired = Vec::new();

        for body in self.kv.list_range(&self.local_key).await? {
            let request: QueuedRequest = serde_json::from_str(&body)?;
            if request.is_expired(now_ms) && self.kv.list_remove(&self.local_key, &body).await? {
                self.kv.list_push_back(&self.dlq_key, body).await?;
                self.note_swept(&request.request_id);
                expired.push(request.request_id);
            }
        }

        for body in self.kv.zset_members(&self.global_key).await? {
            let request: QueuedRequest = serde_json::from_str(&body)?;
            if request.is_expired(now_ms) && self.kv.zset_remove(&self.global_key, &body).await? {
                self.kv.list_push_back(&self.dlq_key, body).await?;
                self.note_swept(&request.request_id);
                expired.push(request.request_id);
            }
        }

        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), "expired requests moved to dlq");
        }

        Ok(expired)
    }

    /// Current depths of all three lists.
    pub async fn depths(&self) -> Result<QueueDepths, QueueError> {
        let depths = QueueDepths {
            local: self.kv.list_len(&self.local_key).await?,
            global: self.kv.zset_len(&self.global_key).await?,
            dlq: self.kv.list_len(&self.dlq_key).await?,
        };

        #[cfg(feature = "metrics")]
        {
            metrics::gauge!("fairgate_queue_depth", "level" => "local").set(depths.local as f64);
            metrics::gauge!("fairgate_queue_depth", "level" => "global").set(depths.global as f64);
            metrics::gauge!("fairgate_queue_depth", "level" => "dlq").set(depths.dlq as f64);
        }

        Ok(depths)
    }

    fn record_enqueue(&self, request_id: &RequestId, level: QueueLevel, depth: usize) {
        self.config.event_listeners.emit(&QueueEvent::Enqueued {
            request_id: request_id.clone(),
            level,
            depth,
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("fairgate_queue_enqueued_total", "level" => level.as_str())
            .increment(1);

        tracing::debug!(
            request_id = %request_id,
            level = level.as_str(),
            depth,
            "request enqueued"
        );
    }

    fn note_swept(&self, request_id: &RequestId) {
        self.config.event_listeners.emit(&QueueEvent::SweptToDlq {
            request_id: request_id.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("fairgate_queue_dlq_total").increment(1);
    }
}
