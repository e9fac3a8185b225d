//! Ingestion tick (§4.E, §5): every `ingest_tick_interval`, walks the active
//! source catalogue and enqueues one `FetchSource` job per source.
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::queue::{JobEnqueuer, JobPayload, NewQueuedJob};
use crate::store::SourceStore;

pub(crate) fn spawn(
    source_store: Arc<dyn SourceStore>,
    queue: Arc<dyn JobEnqueuer>,
    tick_interval: Duration,
    job_ttl_seconds: i64,
    max_retries: i32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            ticker.tick().await;
            if let Err(error) = run_tick(&source_store, &queue, job_ttl_seconds, max_retries).await {
                error!(%error, "ingest tick failed");
            }
        }
    })
}

async fn run_tick(
    source_store: &Arc<dyn SourceStore>,
    queue: &Arc<dyn JobEnqueuer>,
    job_ttl_seconds: i64,
    max_retries: i32,
) -> anyhow::Result<()> {
    let sources = source_store.active_sources().await?;
    let mut submitted = 0usize;
    for source in &sources {
        let payload = JobPayload::FetchSource {
            source_id: source.id,
            url: source.url.clone(),
        };
        queue
            .enqueue(NewQueuedJob::new(payload, job_ttl_seconds, max_retries))
            .await?;
        submitted += 1;
    }
    info!(submitted, total = sources.len(), "ingest tick dispatched");
    Ok(())
}
