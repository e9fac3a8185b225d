use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::store::QueueStore;
use super::types::{JobPayload, QueuedJob};
use crate::observability::metrics::Metrics;
use crate::util::retry::RetryConfig;

/// Executes a single job payload. One implementation dispatches across all
/// four job kinds by delegating to the relevant pipeline stage.
#[async_trait]
pub(crate) trait JobHandler: Send + Sync {
    async fn handle(&self, payload: &JobPayload) -> Result<()>;
}

pub(crate) struct QueueWorker<H: JobHandler> {
    store: Arc<QueueStore>,
    handler: Arc<H>,
    semaphore: Arc<Semaphore>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl<H: JobHandler + 'static> QueueWorker<H> {
    pub(crate) fn new(
        store: Arc<QueueStore>,
        handler: Arc<H>,
        concurrency: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            handler,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            retry: RetryConfig::default(),
            metrics,
        }
    }

    /// Runs the claim-dispatch loop until the semaphore is closed (never, in
    /// practice: the process shuts down via signal instead).
    pub(crate) async fn run(&self) -> Result<()> {
        info!(
            concurrency = self.semaphore.available_permits(),
            "starting job queue worker"
        );

        loop {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let job = match self.store.claim_next().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    sleep(Duration::from_millis(200)).await;
                    continue;
                }
                Err(error) => {
                    error!(%error, "failed to claim next job");
                    drop(permit);
                    sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let store = self.store.clone();
            let handler = self.handler.clone();
            let retry = self.retry;
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::process(store, handler, job, retry, metrics).await;
            });
        }

        Ok(())
    }

    async fn process(
        store: Arc<QueueStore>,
        handler: Arc<H>,
        job: QueuedJob,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) {
        let job_id = job.id;
        let kind = job.payload.kind().as_str();

        debug!(job_id, kind, retry_count = job.retry_count, "processing job");
        metrics.active_jobs.inc();

        match handler.handle(&job.payload).await {
            Ok(()) => {
                metrics.jobs_completed_total.inc();
                if let Err(error) = store.mark_completed(job_id).await {
                    error!(job_id, %error, "failed to mark job completed");
                }
            }
            Err(error) => {
                let backoff = retry.delay_for_attempt(job.retry_count as usize + 1);
                match store.mark_failed(&job, &error.to_string(), backoff).await {
                    Ok(true) => warn!(
                        job_id,
                        kind,
                        retry_count = job.retry_count + 1,
                        max_retries = job.max_retries,
                        %error,
                        "job failed, will retry"
                    ),
                    Ok(false) => {
                        metrics.jobs_failed_total.inc();
                        error!(
                            job_id,
                            kind,
                            retry_count = job.retry_count,
                            %error,
                            "job failed after max retries"
                        );
                    }
                    Err(store_error) => {
                        error!(job_id, %store_error, "failed to record job failure");
                    }
                }
            }
        }

        metrics.active_jobs.dec();
    }
}
