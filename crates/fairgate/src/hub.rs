//! In-process completion delivery.

use fairgate_core::{ProcessFailure, QueryOutcome, RequestId};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

type Outcome = Result<QueryOutcome, ProcessFailure>;

/// Maps request ids to the caller waiting for their outcome. A request
/// drained from the global queue by a different instance has no waiter
/// here; its outcome is audited and dropped (delivery is at-most-once).
#[derive(Default)]
pub struct CompletionHub {
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
}

impl CompletionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for a request. Must happen before the request is
    /// enqueued, or the completion could race past it.
    pub fn register(&self, request_id: RequestId) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().insert(request_id, tx);
        rx
    }

    /// Delivers an outcome. Returns false when no local waiter exists.
    pub fn publish(&self, request_id: &RequestId, outcome: Outcome) -> bool {
        let sender = self.waiters.lock().unwrap().remove(request_id);
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Drops a registration (the caller stopped waiting).
    pub fn forget(&self, request_id: &RequestId) {
        self.waiters.lock().unwrap().remove(request_id);
    }

    pub fn pending(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairgate_core::TenantId;

    fn outcome(id: &RequestId) -> Outcome {
        Ok(QueryOutcome {
            request_id: id.clone(),
            tenant_id: TenantId::from("acme"),
            answer: "a".to_string(),
            sources: Vec::new(),
            cost_dollars: 0.0,
            tokens_used: 0,
            latency_ms: 1,
        })
    }

    #[tokio::test]
    async fn delivers_to_the_registered_waiter() {
        let hub = CompletionHub::new();
        let id = RequestId::new("r1");
        let rx = hub.register(id.clone());

        assert!(hub.publish(&id, outcome(&id)));
        let received = rx.await.unwrap().unwrap();
        assert_eq!(received.request_id, id);
        assert_eq!(hub.pending(), 0);
    }

    #[tokio::test]
    async fn publish_without_waiter_reports_false() {
        let hub = CompletionHub::new();
        let id = RequestId::new("foreign");
        assert!(!hub.publish(&id, outcome(&id)));
    }

    #[tokio::test]
    async fn forget_removes_the_registration() {
        let hub = CompletionHub::new();
        let id = RequestId::new("r1");
        let _rx = hub.register(id.clone());
        hub.forget(&id);
        assert!(!hub.publish(&id, outcome(&id)));
    }
}
