//! Fixed pool of cooperative workers.

use crate::config::WorkerConfig;
use crate::events::SchedulerEvent;
use crate::scheduler::FairScheduler;
use fairgate_core::{
    unix_now_ms, AuditRecord, AuditSink, CostEvent, CostKind, ProcessFailure, QueryOutcome,
    QueuedRequest,
};
use fairgate_queue::TwoLevelQueue;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Executes one dispatched request. The pool itself never retries; retry
/// behavior lives inside the processor's resilience adapters.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(&self, request: &QueuedRequest) -> Result<QueryOutcome, ProcessFailure>;
}

/// Invoked with the terminal result of every dispatched request.
pub type CompletionHandler =
    Arc<dyn Fn(&QueuedRequest, &Result<QueryOutcome, ProcessFailure>) + Send + Sync>;

struct WorkerCtx {
    scheduler: Arc<FairScheduler>,
    queue: Arc<TwoLevelQueue>,
    processor: Arc<dyn RequestProcessor>,
    audit: Arc<dyn AuditSink>,
    on_complete: CompletionHandler,
    config: WorkerConfig,
}

/// Fixed-size pool of workers pulling from the fair scheduler.
///
/// Each worker loops: acquire the next request, run the processor under the
/// request's remaining deadline, signal completion, emit cost and audit
/// records. Shutdown stops intake, waits out the grace period, then cancels
/// whatever is left and returns it to the DLQ.
pub struct WorkerPool {
    ctx: Arc<WorkerCtx>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        scheduler: Arc<FairScheduler>,
        queue: Arc<TwoLevelQueue>,
        processor: Arc<dyn RequestProcessor>,
        audit: Arc<dyn AuditSink>,
        on_complete: CompletionHandler,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ctx: Arc::new(WorkerCtx {
                scheduler,
                queue,
                processor,
                audit,
                on_complete,
                config,
            }),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker tasks. Idempotent: a started pool is left alone.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap();
        if !handles.is_empty() {
            return;
        }
        tracing::info!(size = self.ctx.config.pool_size, "starting worker pool");
        for worker_id in 0..self.ctx.config.pool_size {
            let ctx = Arc::clone(&self.ctx);
            let shutdown = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(worker_loop(ctx, worker_id, shutdown)));
        }
    }

    /// Graceful shutdown: stop intake, give in-progress work the grace
    /// period, then cancel the rest and dead-letter it.
    pub async fn shutdown(&self) {
        tracing::info!(
            grace_secs = self.ctx.config.shutdown_grace.as_secs(),
            "stopping worker pool"
        );
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        let deadline = Instant::now() + self.ctx.config.shutdown_grace;
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                tracing::warn!("worker did not stop within grace period; cancelling");
                handle.abort();
            }
        }

        // Whatever is still registered was cancelled mid-flight.
        for entry in self.ctx.scheduler.drain_in_flight().await {
            if let Err(error) = self.ctx.queue.push_dlq(&entry.request).await {
                tracing::error!(
                    request_id = %entry.request.request_id,
                    error = %error,
                    "failed to dead-letter cancelled request"
                );
            }
        }
    }
}

async fn worker_loop(ctx: Arc<WorkerCtx>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(worker_id, "worker started");
    ctx.scheduler
        .config_events()
        .emit(&SchedulerEvent::WorkerStarted {
            worker_id,
            timestamp: std::time::Instant::now(),
        });

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            next = ctx.scheduler.acquire() => match next {
                Ok(request) => run_one(&ctx, worker_id, request).await,
                Err(error) => {
                    tracing::error!(worker_id, error = %error, "scheduler acquire failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
        }
    }

    ctx.scheduler
        .config_events()
        .emit(&SchedulerEvent::WorkerStopped {
            worker_id,
            timestamp: std::time::Instant::now(),
        });
    tracing::info!(worker_id, "worker stopped");
}

async fn run_one(ctx: &WorkerCtx, worker_id: usize, request: QueuedRequest) {
    let started = Instant::now();
    tracing::debug!(
        worker_id,
        request_id = %request.request_id,
        tenant_id = %request.tenant_id,
        "processing request"
    );

    let remaining = request.remaining(unix_now_ms());
    let result: Result<QueryOutcome, ProcessFailure> = if remaining.is_zero() {
        Err(ProcessFailure::deadline_exceeded())
    } else {
        match tokio::time::timeout(remaining, ctx.processor.process(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProcessFailure::deadline_exceeded()),
        }
    };

    ctx.scheduler.complete(&request.request_id).await;

    let elapsed = started.elapsed();
    let status = match &result {
        Ok(_) => "completed",
        Err(failure) => failure.kind.code(),
    };

    ctx.audit.cost(CostEvent {
        tenant_id: request.tenant_id.clone(),
        request_id: request.request_id.clone(),
        kind: CostKind::Compute,
        amount_dollars: elapsed.as_secs_f64() * ctx.config.compute_cost_per_second,
        ts_ms: unix_now_ms(),
    });
    ctx.audit.audit(AuditRecord {
        tenant_id: request.tenant_id.clone(),
        user_id: request.user_id.clone(),
        request_id: Some(request.request_id.clone()),
        action: "query".to_string(),
        status: status.to_string(),
        ts_ms: unix_now_ms(),
    });

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("fairgate_completions_total", "status" => status.to_string())
            .increment(1);
        metrics::histogram!("fairgate_request_latency_seconds").record(elapsed.as_secs_f64());
    }

    if let Some(target) = ctx.config.target_latency_p95 {
        if elapsed > target {
            tracing::warn!(
                request_id = %request.request_id,
                latency_ms = elapsed.as_millis() as u64,
                target_ms = target.as_millis() as u64,
                "latency sla violated"
            );
        }
    }

    tracing::info!(
        worker_id,
        request_id = %request.request_id,
        status,
        latency_ms = elapsed.as_millis() as u64,
        "request finished"
    );

    (ctx.on_complete)(&request, &result);
}
