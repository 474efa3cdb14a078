//! Events emitted by the two-level queue.

use fairgate_core::{PlatformEvent, RequestId};
use std::time::Instant;

/// Which level of the queue an item landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLevel {
    Local,
    Global,
}

impl QueueLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueLevel::Local => "local",
            QueueLevel::Global => "global",
        }
    }
}

#[derive(Debug)]
pub enum QueueEvent {
    Enqueued {
        request_id: RequestId,
        level: QueueLevel,
        depth: usize,
        timestamp: Instant,
    },
    Overflowed {
        request_id: RequestId,
        timestamp: Instant,
    },
    SweptToDlq {
        request_id: RequestId,
        timestamp: Instant,
    },
    NearCapacity {
        depth: usize,
        capacity: usize,
        timestamp: Instant,
    },
}

impl PlatformEvent for QueueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "request_enqueued",
            QueueEvent::Overflowed { .. } => "queue_overflow",
            QueueEvent::SweptToDlq { .. } => "swept_to_dlq",
            QueueEvent::NearCapacity { .. } => "near_capacity",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            QueueEvent::Enqueued { timestamp, .. }
            | QueueEvent::Overflowed { timestamp, .. }
            | QueueEvent::SweptToDlq { timestamp, .. }
            | QueueEvent::NearCapacity { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        "two_level_queue"
    }
}
