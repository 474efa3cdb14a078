//! The platform runtime: owns every component and wires the request
//! lifecycle end to end.

use crate::config::PlatformConfig;
use crate::hub::CompletionHub;
use async_trait::async_trait;
use fairgate_admission::{AdmissionGate, AdmissionRequest, RateLimitInfo, Rejection};
use fairgate_cache::TenantCache;
use fairgate_core::{
    unix_now_ms, DependencyError, ErrorKind, ProcessFailure, QueryOutcome, QueuedRequest,
    RequestId,
};
use fairgate_pipeline::{PipelineError, RagPipeline};
use fairgate_queue::{EnqueueError, QueueSweeper, TwoLevelQueue};
use fairgate_scheduler::{FairScheduler, RequestProcessor, WorkerPool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The external collaborators a runtime is built from.
#[derive(Clone)]
pub struct Adapters {
    pub tenants: Arc<dyn fairgate_core::TenantDirectory>,
    pub retrieval: Arc<dyn fairgate_core::RetrievalBackend>,
    pub llm: Arc<dyn fairgate_core::LlmClient>,
    pub kv: Arc<dyn fairgate_core::KvStore>,
    pub audit: Arc<dyn fairgate_core::AuditSink>,
}

/// Receipt for an accepted submission.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub request_id: RequestId,
    pub rate: RateLimitInfo,
}

/// Any caller-visible failure of the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Failed(#[from] ProcessFailure),

    /// The request was accepted but its outcome was never delivered
    /// (instance shutdown or pickup by another instance).
    #[error("request was cancelled before completion")]
    Cancelled,
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Rejected(rejection) => rejection.kind(),
            PlatformError::Failed(failure) => failure.kind,
            PlatformError::Cancelled => ErrorKind::TransientDependency,
        }
    }
}

struct PipelineProcessor {
    pipeline: RagPipeline,
}

#[async_trait]
impl RequestProcessor for PipelineProcessor {
    async fn process(&self, request: &QueuedRequest) -> Result<QueryOutcome, ProcessFailure> {
        let deadline = Instant::now() + request.remaining(unix_now_ms());
        self.pipeline
            .execute(request, deadline)
            .await
            .map_err(PipelineError::into_failure)
    }
}

/// A running fairgate instance.
///
/// Construction wires admission → queue → scheduler → workers → pipeline
/// and starts the background tasks. Teardown is ordered: workers stop
/// first (outstanding work is dead-lettered after the grace period), then
/// the sweeper; adapter handles release when the runtime drops.
pub struct Runtime {
    gate: AdmissionGate,
    queue: Arc<TwoLevelQueue>,
    scheduler: Arc<FairScheduler>,
    pool: WorkerPool,
    hub: Arc<CompletionHub>,
    sweeper_stop: watch::Sender<bool>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    queue_timeout: Duration,
}

impl Runtime {
    /// Builds every component from the configuration and starts the worker
    /// pool and expiry sweeper.
    pub fn start(config: PlatformConfig, adapters: Adapters) -> Self {
        let queue = Arc::new(TwoLevelQueue::new(config.queue(), Arc::clone(&adapters.kv)));
        let scheduler = Arc::new(FairScheduler::new(
            config.scheduler(),
            Arc::clone(&queue),
            Arc::clone(&adapters.audit),
        ));

        let pipeline = RagPipeline::new(
            config.pipeline(),
            config.guards(),
            Arc::clone(&adapters.tenants),
            Arc::clone(&adapters.retrieval),
            Arc::clone(&adapters.llm),
            TenantCache::new(config.cache(), Arc::clone(&adapters.kv)),
            Arc::clone(&adapters.audit),
        );

        let hub = Arc::new(CompletionHub::new());
        let hub_for_workers = Arc::clone(&hub);
        let pool = WorkerPool::new(
            config.worker(),
            Arc::clone(&scheduler),
            Arc::clone(&queue),
            Arc::new(PipelineProcessor { pipeline }),
            Arc::clone(&adapters.audit),
            Arc::new(move |request, result| {
                if !hub_for_workers.publish(&request.request_id, result.clone()) {
                    tracing::debug!(
                        request_id = %request.request_id,
                        "completion had no local waiter"
                    );
                }
            }),
        );
        pool.start();

        let (sweeper_stop, sweeper_rx) = watch::channel(false);
        let sweeper_handle =
            QueueSweeper::new(Arc::clone(&queue), config.sweep_interval).spawn(sweeper_rx);

        let gate = AdmissionGate::new(
            config.admission(),
            Arc::clone(&adapters.tenants),
            Arc::clone(&adapters.kv),
            Arc::clone(&adapters.audit),
        );

        tracing::info!(
            instance_id = queue.instance_id(),
            workers = config.worker_pool_size,
            max_in_flight = config.max_in_flight,
            "fairgate runtime started"
        );

        Self {
            gate,
            queue,
            scheduler,
            pool,
            hub,
            sweeper_stop,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            queue_timeout: config.queue_timeout,
        }
    }

    /// Admits and enqueues a request without waiting for its outcome.
    pub async fn submit(&self, request: AdmissionRequest) -> Result<SubmitReceipt, Rejection> {
        let admitted = self.gate.admit(request).await?;
        self.enqueue_admitted(&admitted.request).await?;
        Ok(SubmitReceipt {
            request_id: admitted.request.request_id,
            rate: admitted.rate,
        })
    }

    /// Admits a request and waits for its outcome, bounded by the request
    /// deadline plus a bookkeeping margin.
    pub async fn execute(&self, request: AdmissionRequest) -> Result<QueryOutcome, PlatformError> {
        let admitted = self.gate.admit(request).await.map_err(PlatformError::Rejected)?;
        let request_id = admitted.request.request_id.clone();

        // Register before enqueueing so a fast completion cannot race past
        // the waiter.
        let receiver = self.hub.register(request_id.clone());
        if let Err(rejection) = self.enqueue_admitted(&admitted.request).await {
            self.hub.forget(&request_id);
            return Err(PlatformError::Rejected(rejection));
        }

        let wait = admitted.request.remaining(unix_now_ms()) + Duration::from_secs(2);
        match tokio::time::timeout(wait, receiver).await {
            Ok(Ok(outcome)) => outcome.map_err(PlatformError::Failed),
            Ok(Err(_)) => Err(PlatformError::Cancelled),
            Err(_) => {
                self.hub.forget(&request_id);
                Err(PlatformError::Failed(ProcessFailure::deadline_exceeded()))
            }
        }
    }

    async fn enqueue_admitted(&self, request: &QueuedRequest) -> Result<(), Rejection> {
        match self.queue.enqueue(request).await {
            Ok(_) => {
                self.scheduler.wake();
                Ok(())
            }
            Err(EnqueueError::Overflow) => Err(Rejection::QueueOverflow),
            Err(EnqueueError::Kv(error)) => Err(Rejection::Dependency(error)),
            Err(EnqueueError::Encode(error)) => Err(Rejection::Dependency(
                DependencyError::Permanent(error.to_string()),
            )),
        }
    }

    /// The queue, for observability and tests.
    pub fn queue(&self) -> &Arc<TwoLevelQueue> {
        &self.queue
    }

    /// The scheduler, for observability and tests.
    pub fn scheduler(&self) -> &Arc<FairScheduler> {
        &self.scheduler
    }

    /// Time budget stamped on admitted requests.
    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }

    /// Ordered teardown: workers, then the sweeper. Outstanding work is
    /// returned to the DLQ by the pool shutdown.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
        let _ = self.sweeper_stop.send(true);
        let handle = self.sweeper_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("fairgate runtime stopped");
    }
}
