//! Durable, Postgres-backed job queue (`SELECT ... FOR UPDATE SKIP LOCKED`)
//! carrying the four pipeline job kinds with per-kind TTL and retry/backoff.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::info;

mod store;
#[cfg(test)]
pub(crate) mod mock;
mod types;
mod worker;

pub(crate) use store::QueueStore;
pub(crate) use types::{JobKind, JobPayload, NewQueuedJob, QueuedJob, QueuedJobId};
pub(crate) use worker::{JobHandler, QueueWorker};

/// Narrow enqueue-only seam so pipeline stages can fan out follow-up jobs
/// without depending on the full `JobQueue` (worker pool, reaper).
#[async_trait]
pub(crate) trait JobEnqueuer: Send + Sync {
    async fn enqueue(&self, job: NewQueuedJob) -> anyhow::Result<QueuedJobId>;
}

/// Owns the worker pool and the background TTL reaper for one queue.
pub(crate) struct JobQueue {
    store: Arc<QueueStore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub(crate) fn new(store: QueueStore) -> Self {
        Self {
            store: Arc::new(store),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn store(&self) -> Arc<QueueStore> {
        self.store.clone()
    }

    pub(crate) async fn enqueue(&self, job: NewQueuedJob) -> anyhow::Result<QueuedJobId> {
        self.store.enqueue(job).await
    }

    /// Spawns `concurrency` worker tasks dispatching through `handler`.
    pub(crate) fn spawn_workers<H: JobHandler + 'static>(
        &self,
        handler: Arc<H>,
        concurrency: usize,
        metrics: Arc<crate::observability::metrics::Metrics>,
    ) {
        let mut tasks = self.tasks.lock().unwrap();
        for worker_id in 0..concurrency {
            let worker = QueueWorker::new(self.store.clone(), handler.clone(), 1, metrics.clone());
            tasks.push(tokio::spawn(async move {
                info!(worker_id, "starting job queue worker");
                if let Err(error) = worker.run().await {
                    tracing::error!(worker_id, %error, "job queue worker exited with error");
                }
            }));
        }
    }

    /// Periodically drops pending jobs whose TTL has elapsed.
    pub(crate) fn spawn_reaper(&self, interval: Duration) {
        let store = self.store.clone();
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.reap_expired().await {
                    Ok(0) => {}
                    Ok(count) => info!(count, "reaped expired queue jobs"),
                    Err(error) => tracing::error!(%error, "failed to reap expired queue jobs"),
                }
            }
        }));
    }

    pub(crate) async fn shutdown(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        info!("job queue workers stopped");
    }
}

#[async_trait]
impl JobEnqueuer for JobQueue {
    async fn enqueue(&self, job: NewQueuedJob) -> anyhow::Result<QueuedJobId> {
        Self::enqueue(self, job).await
    }
}
